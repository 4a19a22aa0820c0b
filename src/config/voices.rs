//! Built-in voices of the speech provider.
//!
//! The provider adds voices over time, so an unknown name is a warning, not an error.

/// Metadata for a built-in voice.
#[derive(Debug, Clone, Copy)]
pub struct Voice {
    pub character: &'static str,
    /// Only accepted by the newer instruction-following models
    pub newer_models_only: bool,
}

/// All voices, sorted by name for binary search.
const VOICES: &[(&str, Voice)] = &[
    ("alloy", Voice { character: "neutral, balanced", newer_models_only: false }),
    ("ash", Voice { character: "warm, conversational", newer_models_only: false }),
    ("ballad", Voice { character: "soft, melodic", newer_models_only: true }),
    ("coral", Voice { character: "bright, friendly", newer_models_only: false }),
    ("echo", Voice { character: "calm, measured", newer_models_only: false }),
    ("fable", Voice { character: "expressive, storytelling", newer_models_only: false }),
    ("nova", Voice { character: "energetic, clear", newer_models_only: false }),
    ("onyx", Voice { character: "deep, authoritative", newer_models_only: false }),
    ("sage", Voice { character: "thoughtful, even", newer_models_only: false }),
    ("shimmer", Voice { character: "light, crisp", newer_models_only: false }),
    ("verse", Voice { character: "dynamic, theatrical", newer_models_only: true }),
];

/// Get voice metadata by name.
pub fn get_voice(name: &str) -> Option<&'static Voice> {
    VOICES.binary_search_by_key(&name, |(n, _)| n).ok().map(|idx| &VOICES[idx].1)
}

/// Print all built-in voices.
pub fn print_voices() {
    println!("Built-in voices ({})", VOICES.len());
    println!("{:<10} {:<26} NOTES", "VOICE", "CHARACTER");
    println!("{}", "─".repeat(50));

    for (name, voice) in VOICES {
        let notes = if voice.newer_models_only { "gpt-4o-mini-tts only" } else { "" };
        println!("{:<10} {:<26} {}", name, voice.character, notes);
    }

    println!();
    println!("Usage:");
    println!("  narrate-md -i ./notes --voice nova");
    println!("  OPENAI_TTS_VOICE=onyx narrate-md -i ./notes");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voices_sorted_for_lookup() {
        assert!(VOICES.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(get_voice("alloy").is_some());
        assert!(get_voice("verse").is_some_and(|v| v.newer_models_only));
        assert!(get_voice("robot").is_none());
    }
}
