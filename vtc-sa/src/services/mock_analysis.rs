//! Canned analyses for demo, short-transcript and fallback paths
//!
//! Output is shaped exactly like a provider analysis with every optional
//! field populated, so callers never see a partial result.

use rand::seq::SliceRandom;
use rand::Rng;
use vtc_common::{AnalysisResult, ScoredSection, TranscriptMessage};

/// Duration assumed for [`mock_transcript`]
pub const MOCK_TRANSCRIPT_DURATION_SECS: f64 = 180.0;

struct Scenario {
    label: &'static str,
    base_score: f64,
    strengths: &'static [&'static str],
    areas_for_improvement: &'static [&'static str],
    effective_techniques: &'static [&'static str],
    techniques_needing_work: &'static [&'static str],
    objection_handling: (f64, &'static str),
    closing_effectiveness: (f64, &'static str),
    key_recommendations: &'static [&'static str],
    summary: &'static str,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        label: "Discovery call",
        base_score: 7.2,
        strengths: &[
            "Opened with a clear agenda",
            "Asked open-ended discovery questions",
            "Maintained a friendly, professional tone",
        ],
        areas_for_improvement: &[
            "Quantify the customer's pain before presenting the solution",
            "Reduce filler words during transitions",
        ],
        effective_techniques: &["Active listening", "Summarizing customer needs"],
        techniques_needing_work: &["Budget qualification", "Setting next steps"],
        objection_handling: (6.5, "Acknowledged the timing concern but moved on before resolving it."),
        closing_effectiveness: (6.0, "Proposed a follow-up without securing a specific date."),
        key_recommendations: &[
            "Confirm budget and decision process early",
            "End every call with a calendar commitment",
            "Pause after questions to let the prospect finish",
        ],
        summary: "A solid discovery conversation with good rapport. Qualification and the close need tightening.",
    },
    Scenario {
        label: "Objection-heavy negotiation",
        base_score: 6.1,
        strengths: &[
            "Stayed calm under pricing pressure",
            "Used customer language when restating concerns",
        ],
        areas_for_improvement: &[
            "Avoid discounting before exploring value",
            "Ask clarifying questions before answering objections",
            "Speak more slowly when presenting numbers",
        ],
        effective_techniques: &["Feel-felt-found framing"],
        techniques_needing_work: &["Value anchoring", "Trial closes"],
        objection_handling: (5.5, "Responded to the price objection with a discount instead of value."),
        closing_effectiveness: (5.0, "No clear ask was made at the end of the call."),
        key_recommendations: &[
            "Anchor on outcomes before discussing price",
            "Use a trial close after each resolved objection",
        ],
        summary: "The trainee kept the conversation alive under pressure but conceded on price too early.",
    },
    Scenario {
        label: "Closing conversation",
        base_score: 8.3,
        strengths: &[
            "Recapped agreed value concisely",
            "Handled the final concern with evidence",
            "Asked directly for the commitment",
        ],
        areas_for_improvement: &["Check for additional stakeholders before closing"],
        effective_techniques: &["Assumptive close", "Social proof"],
        techniques_needing_work: &["Multi-threading"],
        objection_handling: (8.0, "Addressed the integration concern with a relevant customer story."),
        closing_effectiveness: (8.5, "Secured verbal agreement and a signature date."),
        key_recommendations: &[
            "Map all decision makers earlier in the cycle",
            "Send a written recap within the hour",
        ],
        summary: "A confident close with clear value recap and a direct ask.",
    },
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Random canned analysis
pub fn generate_mock_analysis() -> AnalysisResult {
    generate_with(&mut rand::thread_rng())
}

/// Canned analysis drawn from `rng`; score jittered by up to half a point
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> AnalysisResult {
    let scenario = SCENARIOS.choose(rng).unwrap_or(&SCENARIOS[0]);
    let jitter: f64 = rng.gen_range(-0.5..=0.5);

    AnalysisResult {
        overall_score: round_tenth((scenario.base_score + jitter).clamp(0.0, 10.0)),
        strengths: owned(scenario.strengths),
        areas_for_improvement: owned(scenario.areas_for_improvement),
        effective_techniques: owned(scenario.effective_techniques),
        techniques_needing_work: owned(scenario.techniques_needing_work),
        objection_handling: Some(ScoredSection {
            score: scenario.objection_handling.0,
            analysis: scenario.objection_handling.1.to_string(),
        }),
        closing_effectiveness: Some(ScoredSection {
            score: scenario.closing_effectiveness.0,
            analysis: scenario.closing_effectiveness.1.to_string(),
        }),
        key_recommendations: owned(scenario.key_recommendations),
        detailed_analysis: Some(format!("{}: {}", scenario.label, scenario.summary)),
    }
}

/// Sample conversation returned when the pipeline itself failed
pub fn mock_transcript() -> Vec<TranscriptMessage> {
    [
        ("user", "Hi, this is Jordan from Northwind. Do you have a few minutes to talk about your reporting workflow?"),
        ("client", "Sure, but I only have about ten minutes."),
        ("user", "Understood. How is your team building the weekly reports today?"),
        ("client", "Mostly spreadsheets. It takes a full day and there are often mistakes."),
        ("user", "That sounds painful. If that day came back to your team, where would it go?"),
        ("client", "Honestly, into analysis instead of copy and paste."),
        ("user", "Would it be worth a thirty minute demo next week to see how that could work?"),
        ("client", "Yes, Thursday afternoon works for me."),
    ]
    .iter()
    .map(|(speaker, message)| TranscriptMessage::new(*speaker, *message))
    .collect()
}
