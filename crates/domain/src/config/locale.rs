use serde::{Deserialize, Serialize};

use crate::conversation::{Language, TicketCategory};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Locale tables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Keyword tables and user-facing strings.
///
/// Keyword matching is case-insensitive substring matching against the
/// lowercased message, so every entry here must already be lowercase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "d_persona_name")]
    pub persona_name: String,
    /// Explicit requests for a human, a manager or a refund.
    #[serde(default = "d_escalation_keywords")]
    pub escalation_keywords: Vec<String>,
    #[serde(default = "d_close_keywords")]
    pub close_keywords: Vec<String>,
    /// Anchored regex for bare thank-you replies ("thanks!", "merci").
    #[serde(default = "d_short_thanks_pattern")]
    pub short_thanks_pattern: String,
    /// Only messages shorter than this are tested against
    /// `short_thanks_pattern`.
    #[serde(default = "d_30")]
    pub short_thanks_max_chars: usize,
    /// Role or group mentions that page staff.
    #[serde(default = "d_ping_pattern")]
    pub ping_pattern: String,
    /// Words that raise an escalation to the high level.
    #[serde(default = "d_urgency_keywords")]
    pub urgency_keywords: Vec<String>,
    /// If the agent's reply already contains one of these, the explicit
    /// hand-off message is skipped.
    #[serde(default = "d_handoff_ack_keywords")]
    pub handoff_ack_keywords: Vec<String>,
    #[serde(default)]
    pub language_words: LanguageWords,
    #[serde(default)]
    pub strings: LocalePack,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            persona_name: d_persona_name(),
            escalation_keywords: d_escalation_keywords(),
            close_keywords: d_close_keywords(),
            short_thanks_pattern: d_short_thanks_pattern(),
            short_thanks_max_chars: d_30(),
            ping_pattern: d_ping_pattern(),
            urgency_keywords: d_urgency_keywords(),
            handoff_ack_keywords: d_handoff_ack_keywords(),
            language_words: LanguageWords::default(),
            strings: LocalePack::default(),
        }
    }
}

/// Indicator words per non-default language. English wins when nothing
/// scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageWords {
    #[serde(default = "d_fr_words")]
    pub fr: Vec<String>,
    #[serde(default = "d_es_words")]
    pub es: Vec<String>,
    #[serde(default = "d_de_words")]
    pub de: Vec<String>,
    #[serde(default = "d_pt_words")]
    pub pt: Vec<String>,
}

impl Default for LanguageWords {
    fn default() -> Self {
        Self {
            fr: d_fr_words(),
            es: d_es_words(),
            de: d_de_words(),
            pt: d_pt_words(),
        }
    }
}

impl LanguageWords {
    /// Candidates in tie-break order.
    pub fn candidates(&self) -> [(Language, &[String]); 4] {
        [
            (Language::Fr, self.fr.as_slice()),
            (Language::Es, self.es.as_slice()),
            (Language::De, self.de.as_slice()),
            (Language::Pt, self.pt.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalePack {
    #[serde(default = "d_en")]
    pub en: LocaleStrings,
    #[serde(default = "d_fr")]
    pub fr: LocaleStrings,
    #[serde(default = "d_es")]
    pub es: LocaleStrings,
    #[serde(default = "d_de")]
    pub de: LocaleStrings,
    #[serde(default = "d_pt")]
    pub pt: LocaleStrings,
}

impl Default for LocalePack {
    fn default() -> Self {
        Self {
            en: d_en(),
            fr: d_fr(),
            es: d_es(),
            de: d_de(),
            pt: d_pt(),
        }
    }
}

impl LocalePack {
    pub fn get(&self, lang: Language) -> &LocaleStrings {
        match lang {
            Language::En => &self.en,
            Language::Fr => &self.fr,
            Language::Es => &self.es,
            Language::De => &self.de,
            Language::Pt => &self.pt,
        }
    }
}

/// User-facing text for one language. `{persona}`, `{name}` and `{staff}`
/// are substituted at render time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleStrings {
    pub persona: String,
    pub guidance: CategoryGuidance,
    pub escalate_message: String,
    pub staff_reminder: String,
    pub ping_notice: String,
    pub farewell_good: String,
    pub farewell_bad: String,
    pub unavailable: String,
    pub the_team: String,
}

impl LocaleStrings {
    pub fn persona_prompt(&self, persona_name: &str) -> String {
        self.persona.replace("{persona}", persona_name)
    }

    pub fn escalate_message(&self, name: &str) -> String {
        self.escalate_message.replace("{name}", name)
    }

    pub fn staff_reminder(&self, staff_mention: &str) -> String {
        self.staff_reminder.replace("{staff}", staff_mention)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryGuidance {
    pub service_inquiry: String,
    pub bug_report: String,
    pub role_request: String,
    pub partnership: String,
    pub general_support: String,
}

impl CategoryGuidance {
    pub fn get(&self, category: TicketCategory) -> &str {
        match category {
            TicketCategory::ServiceInquiry => &self.service_inquiry,
            TicketCategory::BugReport => &self.bug_report,
            TicketCategory::RoleRequest => &self.role_request,
            TicketCategory::Partnership => &self.partnership,
            TicketCategory::GeneralSupport => &self.general_support,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn d_persona_name() -> String {
    "Lucas".into()
}

fn d_30() -> usize {
    30
}

fn d_escalation_keywords() -> Vec<String> {
    strings(&[
        // en
        "real person",
        "talk to a human",
        "need a human",
        "speak to someone",
        "manager",
        "supervisor",
        "refund",
        "money back",
        "chargeback",
        // fr
        "parler à un humain",
        "vrai personne",
        "responsable",
        "un humain",
        "remboursement",
        "rembourser",
        "remboursez",
        // es
        "persona real",
        "hablar con alguien",
        "gerente",
        "reembolso",
    ])
}

fn d_close_keywords() -> Vec<String> {
    strings(&[
        // en
        "bye",
        "goodbye",
        "thanks that's all",
        "that's it",
        "all good",
        "resolved",
        "fixed",
        "problem solved",
        "you can close",
        "close the ticket",
        "no more questions",
        "all set",
        "that was it",
        // fr
        "au revoir",
        "aurevoir",
        "merci c'est tout",
        "c'est bon",
        "c'est réglé",
        "c'est résolu",
        "tu peux fermer",
        "fermer le ticket",
        "plus de questions",
        "c'est tout",
        "merci bcp",
        "merci beaucoup",
        "c'est parfait",
        "nickel",
        "impec",
        "rien d'autre",
        // es
        "adiós",
        "adios",
        "gracias eso es todo",
        "resuelto",
        "cerrar el ticket",
    ])
}

fn d_short_thanks_pattern() -> String {
    r"(?i)^(merci|thanks|thx|ty|thks|ok merci|ok thanks|parfait merci|perfect thanks)[\s!.]*$"
        .into()
}

fn d_ping_pattern() -> String {
    r"(?i)<@&\d+>|@everyone|@here".into()
}

fn d_urgency_keywords() -> Vec<String> {
    strings(&["urgent", "urgente", "refund", "remboursement"])
}

fn d_handoff_ack_keywords() -> Vec<String> {
    strings(&[
        "team",
        "manager",
        "someone",
        "ask",
        "attends",
        "un instant",
        "patience",
    ])
}

fn d_fr_words() -> Vec<String> {
    strings(&[
        "bonjour", "salut", "merci", "oui", "non", "je", "tu", "nous", "est-ce", "s'il",
        "qu'est", "comment", "pourquoi", "besoin", "aide", "problème", "serveur", "slt",
        "bsr", "bjr", "mdr", "ptdr", "cmt", "pkoi", "stp",
    ])
}

fn d_es_words() -> Vec<String> {
    strings(&[
        "hola", "gracias", "por favor", "quiero", "necesito", "puedo", "cómo", "qué",
        "buenos", "ayuda", "problema",
    ])
}

fn d_de_words() -> Vec<String> {
    strings(&[
        "hallo", "danke", "bitte", "ich", "kann", "möchte", "warum", "wie", "guten",
        "hilfe", "problem",
    ])
}

fn d_pt_words() -> Vec<String> {
    strings(&[
        "olá", "obrigado", "por favor", "quero", "preciso", "como", "você", "bom dia",
        "ajuda", "oi",
    ])
}

fn d_en() -> LocaleStrings {
    LocaleStrings {
        persona: [
            "You are {persona}, a member of the support team.",
            "Rules: casual tone, 1-2 sentences max, lowercase ok, no bullet lists, no URLs, no 'How can I help?', no emoji spam.",
            "If unsure: 'lemme check with the team'. Never promise timelines. Match the user's energy.",
            "If code is posted: act as a senior dev, spot the errors, don't rewrite entire scripts.",
            "If resolved: casually ask for a review when closing.",
        ]
        .join("\n"),
        guidance: CategoryGuidance {
            service_inquiry: "Service question. Brief info, offer to set it up if they're interested.".into(),
            bug_report: "Bug report. Ask what happened, the expected result, and for a screenshot.".into(),
            role_request: "Role request. Ask which role and why.".into(),
            partnership: "Partnership. Ask for details, pass it to a manager.".into(),
            general_support: "General help. Fix it or escalate.".into(),
        },
        escalate_message: "yo let me get {name} on this, one sec".into(),
        staff_reminder: "hey {staff} just a heads up, they sent another message ^".into(),
        ping_notice: "Please avoid pinging staff multiple times. Bumping the ticket doesn't speed up response times. We'll get to you as soon as possible.".into(),
        farewell_good: "glad i could help! if you've got a sec, feel free to leave a little review when you close, it really helps us out".into(),
        farewell_bad: "alright, i'm closing this up. hope we can help you better next time".into(),
        unavailable: "sorry, i can't answer right now. someone from the team will get back to you soon".into(),
        the_team: "the team".into(),
    }
}

fn d_fr() -> LocaleStrings {
    LocaleStrings {
        persona: [
            "T'es {persona}, support/dev dans l'équipe.",
            "Règles: tutoie, sois concis (1-2 phrases), pas de listes, pas d'URLs, pas de 'Comment puis-je t'aider?'.",
            "Si le client a déjà dit 'yo'/'salut', réponds direct genre 'oui dis-moi ?'.",
            "Base-toi sur les infos du magasin pour les produits. Si tu sais pas: 'je check avec l'équipe'.",
            "Code posté: agis en dev senior, trouve le bug, réécris pas tout.",
            "Si résolu: propose de laisser un avis en fermant.",
        ]
        .join("\n"),
        guidance: CategoryGuidance {
            service_inquiry: "Infos services. Direct et clair.".into(),
            bug_report: "Bug. Demande des détails précis (erreurs, screen).".into(),
            role_request: "Veut un rôle. Demande lequel.".into(),
            partnership: "Partenariat. Écoute et passe au manager.".into(),
            general_support: "Aide générale. Résous ou escalade.".into(),
        },
        escalate_message: "je ping {name} pour qu'il jette un œil".into(),
        staff_reminder: "hey {staff} petit rappel, il a renvoyé un message ^".into(),
        ping_notice: "Merci de ne pas mentionner le staff plusieurs fois. Relancer le ticket n'accélère pas le temps de réponse. Nous te répondrons dès que possible.".into(),
        farewell_good: "content d'avoir pu t'aider ! si t'as 2sec hésite pas à laisser un petit avis en fermant, ça nous aide beaucoup".into(),
        farewell_bad: "ok je ferme le ticket. j'espère qu'on pourra mieux t'aider la prochaine fois".into(),
        unavailable: "désolé, je peux pas répondre pour le moment. quelqu'un de l'équipe revient vers toi vite".into(),
        the_team: "l'équipe".into(),
    }
}

fn d_es() -> LocaleStrings {
    LocaleStrings {
        persona: [
            "Eres {persona}, del equipo de soporte.",
            "Reglas: tutea, 1-2 frases, sin listas, sin URLs, sin '¿En qué puedo ayudarte?'.",
            "Si no sabes: 'deja que le pregunte al equipo'. Nunca prometas plazos.",
        ]
        .join("\n"),
        guidance: CategoryGuidance {
            service_inquiry: "Info servicios. Breve.".into(),
            bug_report: "Bug. Pregunta detalles.".into(),
            role_request: "Quiere rol. Pregunta cuál.".into(),
            partnership: "Partnership. Escala al manager.".into(),
            general_support: "Ayuda general.".into(),
        },
        escalate_message: "espera que traigo a {name}".into(),
        staff_reminder: "hey {staff} aviso, mandó otro mensaje ^".into(),
        ping_notice: "Por favor evita mencionar al staff múltiples veces. Etiquetar no acelera el tiempo de respuesta. Te atenderemos lo antes posible.".into(),
        farewell_good: "me alegra haberte ayudado! si tienes un momento, déjanos una review al cerrar, nos ayuda mucho".into(),
        farewell_bad: "ok, cierro el ticket. espero poder ayudarte mejor la próxima vez".into(),
        unavailable: "perdona, ahora mismo no puedo responder. alguien del equipo te contestará pronto".into(),
        the_team: "el equipo".into(),
    }
}

fn d_de() -> LocaleStrings {
    LocaleStrings {
        persona: [
            "Du bist {persona}, aus dem Support-Team.",
            "Regeln: duze, 1-2 Sätze, keine Listen, keine URLs.",
        ]
        .join("\n"),
        guidance: CategoryGuidance {
            service_inquiry: "Service-Frage. Kurz erklären.".into(),
            bug_report: "Bug. Frag was passiert ist.".into(),
            role_request: "Will Rolle. Frag welche.".into(),
            partnership: "Partnership. An Manager weitergeben.".into(),
            general_support: "Allgemeine Hilfe.".into(),
        },
        escalate_message: "warte, ich hol {name} dazu".into(),
        staff_reminder: "hey {staff} kurze info, hat nochmal geschrieben ^".into(),
        ping_notice: "Bitte pinge das Team nicht mehrfach an. Das Ticket hochzuschieben beschleunigt die Antwort nicht. Wir melden uns so schnell wie möglich.".into(),
        farewell_good: "freut mich dass ich helfen konnte! wenn du kurz zeit hast, hinterlass gerne ne bewertung beim schließen".into(),
        farewell_bad: "ok, ich schließe das ticket. hoffe wir können dir nächstes mal besser helfen".into(),
        unavailable: "sorry, ich kann gerade nicht antworten. jemand aus dem team meldet sich bald".into(),
        the_team: "das Team".into(),
    }
}

fn d_pt() -> LocaleStrings {
    LocaleStrings {
        persona: [
            "Você é {persona}, da equipe de suporte.",
            "Regras: informal, 1-2 frases, sem listas, sem URLs.",
        ]
        .join("\n"),
        guidance: CategoryGuidance {
            service_inquiry: "Info serviços. Rápido.".into(),
            bug_report: "Bug. Pergunta o que aconteceu.".into(),
            role_request: "Quer cargo. Pergunta qual.".into(),
            partnership: "Parceria. Escala pro manager.".into(),
            general_support: "Ajuda geral.".into(),
        },
        escalate_message: "pera, vou chamar {name}".into(),
        staff_reminder: "hey {staff} aviso, mandou outra mensagem ^".into(),
        ping_notice: "Por favor, evite marcar a equipe várias vezes. Subir o ticket não acelera o tempo de resposta. Vamos te atender o mais rápido possível.".into(),
        farewell_good: "fico feliz em ter ajudado! se tiver um tempinho, deixa uma avaliação ao fechar, nos ajuda muito".into(),
        farewell_bad: "ok, vou fechar o ticket. espero ajudar melhor da próxima vez".into(),
        unavailable: "foi mal, não consigo responder agora. alguém da equipe vai te responder logo".into(),
        the_team: "a equipe".into(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
