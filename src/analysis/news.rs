// =============================================================================
// News Sentiment — keyword classification and major events
// =============================================================================
//
// Each item (title + content) is classified through a `SentimentClassifier`.
// The overall mood is decided when one polarity exceeds the dominance share;
// titles carrying event keywords are surfaced as major events and nudge the
// score up (bullish) or down (bearish).
// =============================================================================

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

use crate::runtime_config::NewsThresholds;
use crate::types::{NewsItem, SubAnalysis};

// ---------------------------------------------------------------------------
// Classification seam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn label(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

/// Anything that can label a piece of text.  The keyword classifier is the
/// stock implementation; a model-backed one can be dropped in.
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Sentiment;
}

/// Case-insensitive substring matcher.  Text matching both lists, or
/// neither, is neutral.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(positive: &[String], negative: &[String]) -> Self {
        Self {
            positive: lowercase_all(positive),
            negative: lowercase_all(negative),
        }
    }

    pub fn from_thresholds(t: &NewsThresholds) -> Self {
        Self::new(&t.positive_keywords, &t.negative_keywords)
    }
}

impl SentimentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Sentiment {
        let text = text.to_lowercase();
        let pos = contains_any(&text, &self.positive);
        let neg = contains_any(&text, &self.negative);
        match (pos, neg) {
            (true, false) => Sentiment::Positive,
            (false, true) => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

fn lowercase_all(words: &[String]) -> Vec<String> {
    words
        .iter()
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn contains_any(lowered: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| lowered.contains(k.as_str()))
}

/// Items published within `days` of `now`, newest first.
pub fn recent_news(items: Vec<NewsItem>, now: DateTime<FixedOffset>, days: u32) -> Vec<NewsItem> {
    let cutoff = now - Duration::days(i64::from(days));
    let mut recent: Vec<NewsItem> = items
        .into_iter()
        .filter(|n| n.publish_time >= cutoff)
        .collect();
    recent.sort_by(|a, b| b.publish_time.cmp(&a.publish_time));
    recent
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MajorEvent {
    pub title: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsAnalysis {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub positive_pct: f64,
    pub negative_pct: f64,
    pub sentiment: Sentiment,
    pub sentiment_comment: String,
    /// Items whose title carries an event keyword, in input order.
    pub major_events: Vec<MajorEvent>,
    pub has_bullish_event: bool,
    pub has_bearish_event: bool,
}

pub fn analyze(
    items: &[NewsItem],
    classifier: &dyn SentimentClassifier,
    thresholds: &NewsThresholds,
    neutral_score: f64,
) -> SubAnalysis<NewsAnalysis> {
    if items.is_empty() {
        return SubAnalysis::no_data("No recent news found", neutral_score);
    }

    let (analysis, score) = evaluate(items, classifier, thresholds);
    let comment = format!(
        "{} news items, {:.1}% positive; overall sentiment is {}",
        analysis.total,
        analysis.positive_pct,
        analysis.sentiment.label()
    );
    SubAnalysis::success(comment, score, analysis)
}

fn evaluate(
    items: &[NewsItem],
    classifier: &dyn SentimentClassifier,
    t: &NewsThresholds,
) -> (NewsAnalysis, f64) {
    let (mut positive, mut negative, mut neutral) = (0usize, 0usize, 0usize);
    for item in items {
        match classifier.classify(&format!("{}\n{}", item.title, item.content)) {
            Sentiment::Positive => positive += 1,
            Sentiment::Negative => negative += 1,
            Sentiment::Neutral => neutral += 1,
        }
    }

    let total = items.len();
    let positive_pct = positive as f64 / total as f64 * 100.0;
    let negative_pct = negative as f64 / total as f64 * 100.0;

    let (sentiment, sentiment_comment) = if positive_pct > t.dominance_pct {
        (
            Sentiment::Positive,
            "News flow is mostly positive; the market is optimistic about the company".to_string(),
        )
    } else if negative_pct > t.dominance_pct {
        (
            Sentiment::Negative,
            "News flow is mostly negative; watch for downside risk".to_string(),
        )
    } else {
        (
            Sentiment::Neutral,
            "News flow is balanced; market sentiment is neutral".to_string(),
        )
    };

    let bullish = lowercase_all(&t.bullish_event_keywords);
    let bearish = lowercase_all(&t.bearish_event_keywords);

    let mut major_events = Vec::new();
    let (mut has_bullish_event, mut has_bearish_event) = (false, false);
    for item in items {
        let title = item.title.to_lowercase();
        let is_bullish = contains_any(&title, &bullish);
        let is_bearish = contains_any(&title, &bearish);
        has_bullish_event |= is_bullish;
        has_bearish_event |= is_bearish;
        if is_bullish || is_bearish {
            major_events.push(MajorEvent {
                title: item.title.clone(),
                kind: if is_bullish {
                    EventKind::Bullish
                } else {
                    EventKind::Bearish
                },
            });
        }
    }

    let mut score = 50.0 + t.sentiment_tiers.bonus(positive_pct);
    if has_bullish_event {
        score += t.bullish_event_bonus;
    }
    if has_bearish_event {
        score -= t.bearish_event_penalty;
    }

    let analysis = NewsAnalysis {
        total,
        positive,
        negative,
        neutral,
        positive_pct,
        negative_pct,
        sentiment,
        sentiment_comment,
        major_events,
        has_bullish_event,
        has_bearish_event,
    };

    (analysis, score)
}
