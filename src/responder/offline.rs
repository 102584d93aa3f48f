// Offline conversational engine
//
// Rule-based replies used whenever the generative service is unavailable or
// fails. Rules are checked in a fixed order and every path ends in a
// non-empty reply. Where a rule offers several phrasings, the choice is
// derived from a hash of the message so the same input always gets the same
// reply.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::recommendations::ContentCategory;

static HARM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"die|kill|suicide|hurt myself|end it all|no reason to live")
        .expect("Failed to compile harm regex")
});

static GREETING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(hi|hello|hey|greetings|hola)").expect("Failed to compile greeting regex")
});

static FEELING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"i feel|i am feeling|feeling").expect("Failed to compile feeling regex")
});

const SAFETY_REPLY: &str = "I am hearing a lot of pain in your words, and I want you to be safe. \
You are not alone. Please, can you reach out to a professional right now? The crisis helpline is \
available 24/7. Your life matters to us.";

const OPENERS: &[&str] = &[
    "Hello. I'm here and listening. How is your day going?",
    "Hi there. It's a safe space here. What's on your mind?",
    "Welcome. I'm glad you're here. How are you feeling right now?",
];

/// Emotion words inside a "feeling" sentence, checked in order
const REFLECTIONS: &[(&[&str], &str)] = &[
    (
        &["sad", "depressed", "down"],
        "It sounds like you're carrying a heavy weight. I'm here to walk with you through it. \
         Do you want to talk about what triggered these feelings?",
    ),
    (
        &["anxious", "nervous", "scared"],
        "Anxiety can feel like a storm. Let's find some shelter. Have you tried taking a slow, \
         deep breath with me? Tell me, what is the biggest worry on your mind right now?",
    ),
    (
        &["angry", "mad", "furious"],
        "It's okay to let that anger out here. It's often a sign that a boundary was crossed. \
         What made you feel this way?",
    ),
    (
        &["happy", "great", "good"],
        "That is wonderful to hear! Holding onto these moments of light is so important. \
         What was the best part of your experience?",
    ),
    (
        &["lonely", "alone"],
        "Loneliness is a profound feeling, but you are connected here. I am listening to every \
         word. How long have you been feeling this disconnection?",
    ),
];

const TOPICS: &[(&[&str], &str)] = &[
    (
        &["school", "exam", "grade", "study"],
        "Academic pressure is real and valid. Remember, your worth is not defined by a grade. \
         Are you feeling overwhelmed by the workload, or is it the expectations?",
    ),
    (
        &["sleep", "tired", "insomnia"],
        "Rest is difficult when the mind is racing. Have you been able to find any quiet moments \
         before bed, or does the noise follow you there?",
    ),
    (
        &["relationship", "friend", "boyfriend", "girlfriend", "breakup"],
        "Relationships are our deepest mirrors. It sounds like this connection is weighing on you. \
         Do you feel understood by them?",
    ),
];

const FOLLOW_UPS: &[&str] = &[
    "I'm listening. Please, tell me more about that.",
    "That sounds significant. How does that sit with you?",
    "I hear you. What do you think would help you feel a little lighter right now?",
    "Thank you for sharing that with me. It takes courage to be open. What else is on your mind?",
    "I am processing your words. It seems like this matters a lot to you. Can you elaborate?",
];

/// Keyword rules for a best-effort content category, first match wins
const CATEGORY_RULES: &[(&[&str], ContentCategory)] = &[
    (&["sleep", "tired"], ContentCategory::Sleep),
    (&["exam", "study", "fail"], ContentCategory::Academic),
    (&["anx", "worry", "nervous"], ContentCategory::Anxiety),
    (&["sad", "depress", "cry"], ContentCategory::Anxiety),
    (&["stress", "overwhelm"], ContentCategory::Stress),
];

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

/// Stable index into a pool of `len` phrasings
fn pick(text: &str, len: usize) -> usize {
    let digest = Sha256::digest(text.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(bytes) % len as u64) as usize
}

/// Reply to a message without the generative service
pub fn reply(message: &str) -> String {
    let text = message.to_lowercase();

    if HARM_REGEX.is_match(&text) {
        return SAFETY_REPLY.to_string();
    }

    if GREETING_REGEX.is_match(&text) {
        return OPENERS[pick(&text, OPENERS.len())].to_string();
    }

    if FEELING_REGEX.is_match(&text) {
        if let Some((_, reflection)) = REFLECTIONS
            .iter()
            .find(|(words, _)| contains_any(&text, words))
        {
            return reflection.to_string();
        }
    }

    if let Some((_, topic_reply)) = TOPICS.iter().find(|(words, _)| contains_any(&text, words)) {
        return topic_reply.to_string();
    }

    FOLLOW_UPS[pick(&text, FOLLOW_UPS.len())].to_string()
}

/// Best-effort category from keyword rules; `General` when nothing matches
pub fn derive_category(message: &str) -> ContentCategory {
    let text = message.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(words, _)| contains_any(&text, words))
        .map(|(_, category)| *category)
        .unwrap_or(ContentCategory::General)
}
