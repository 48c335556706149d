// Input sanitation shared by `learn` and `predict` (spec.md §4.2).
//
// Non-printable characters are stripped, tokens longer than 256 chars are
// truncated, and empty tokens are dropped entirely (not kept as empty
// strings) — an empty token carries no information and would otherwise
// intern as its own spurious symbol.

const MAX_TOKEN_LEN: usize = 256;

pub fn sanitize_token(token: &str) -> Option<String> {
    let cleaned: String = token.chars().filter(|c| !c.is_control()).collect();
    let truncated: String = cleaned.chars().take(MAX_TOKEN_LEN).collect();
    if truncated.is_empty() {
        None
    } else {
        Some(truncated)
    }
}

pub fn sanitize_sequence(sequence: &[String]) -> Vec<String> {
    sequence.iter().filter_map(|t| sanitize_token(t)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_chars() {
        assert_eq!(sanitize_token("ls\u{0007}").as_deref(), Some("ls"));
    }

    #[test]
    fn truncates_long_tokens() {
        let long = "a".repeat(300);
        let s = sanitize_token(&long).unwrap();
        assert_eq!(s.len(), MAX_TOKEN_LEN);
    }

    #[test]
    fn drops_empties() {
        assert_eq!(sanitize_token(""), None);
        assert_eq!(sanitize_token("\u{0000}"), None);
    }

    #[test]
    fn sequence_drops_empties_but_keeps_order() {
        let seq = vec!["ls".to_string(), "".to_string(), "cd".to_string()];
        assert_eq!(sanitize_sequence(&seq), vec!["ls".to_string(), "cd".to_string()]);
    }
}
