use serde::Serialize;

use tp_domain::conversation::{Sentiment, SentimentSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentTrend {
    Improving,
    Stable,
    Declining,
}

/// Aggregate mood of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentTemperature {
    pub overall: Sentiment,
    pub average: f32,
    pub trend: SentimentTrend,
    pub samples: usize,
}

impl SentimentTemperature {
    /// Positive or neutral overall.
    pub fn is_good_mood(&self) -> bool {
        matches!(self.overall, Sentiment::Positive | Sentiment::Neutral)
    }
}

const POSITIVE_AT: f32 = 0.7;
const NEGATIVE_AT: f32 = 0.3;
const FRUSTRATED_SHARE: f32 = 0.3;
const TREND_DELTA: f32 = 0.15;
const TREND_MIN_SAMPLES: usize = 4;

/// `None` when no sample was recorded.
pub fn temperature(samples: &[SentimentSample]) -> Option<SentimentTemperature> {
    if samples.is_empty() {
        return None;
    }
    let average = mean(samples);

    let mut overall = if average >= POSITIVE_AT {
        Sentiment::Positive
    } else if average <= NEGATIVE_AT {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    };
    let frustrated = samples
        .iter()
        .filter(|s| s.sentiment == Sentiment::Frustrated)
        .count();
    if frustrated as f32 > samples.len() as f32 * FRUSTRATED_SHARE {
        overall = Sentiment::Frustrated;
    }

    let mut trend = SentimentTrend::Stable;
    if samples.len() >= TREND_MIN_SAMPLES {
        let (first, second) = samples.split_at(samples.len() / 2);
        let delta = mean(second) - mean(first);
        if delta > TREND_DELTA {
            trend = SentimentTrend::Improving;
        } else if -delta > TREND_DELTA {
            trend = SentimentTrend::Declining;
        }
    }

    Some(SentimentTemperature {
        overall,
        average,
        trend,
        samples: samples.len(),
    })
}

fn mean(samples: &[SentimentSample]) -> f32 {
    samples.iter().map(|s| s.score).sum::<f32>() / samples.len() as f32
}
