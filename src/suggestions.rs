//! Follow-up suggestions shown under the chat box.

/// Shown when there is no input to derive suggestions from.
pub const FALLBACK_SUGGESTIONS: [&str; 5] = [
    "How can I improve my coding skills?",
    "What are the latest trends in machine learning?",
    "Can you explain the concept of natural language processing?",
    "How can I optimize my website for better performance?",
    "What are some best practices for cybersecurity?",
];

/// Returns exactly five suggestions. Templated on `input` when it is present
/// and non-empty, the fixed fallback list otherwise.
pub fn generate(input: Option<&str>) -> Vec<String> {
    match input {
        Some(input) if !input.is_empty() => vec![
            format!("{input} for beginners"),
            format!("Best practices for {input}"),
            format!("How to learn {input}"),
            format!("Resources to master {input}"),
            format!("Tips and tricks for {input}"),
        ],
        _ => FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_suggestions() {
        assert_eq!(
            generate(Some("python")),
            [
                "python for beginners",
                "Best practices for python",
                "How to learn python",
                "Resources to master python",
                "Tips and tricks for python",
            ]
        );
    }

    #[test]
    fn every_suggestion_contains_the_input() {
        for input in ["rust", "C++ templates", "  spaced  ", "ü"] {
            let suggestions = generate(Some(input));
            assert_eq!(suggestions.len(), 5);
            assert!(suggestions.iter().all(|s| s.contains(input)));
            assert_eq!(suggestions, generate(Some(input)));
        }
    }

    #[test]
    fn absent_or_empty_input_falls_back() {
        let fallback = generate(None);
        assert_eq!(fallback, FALLBACK_SUGGESTIONS);
        assert_eq!(generate(Some("")), fallback);
        assert_eq!(generate(None), fallback);
    }
}
