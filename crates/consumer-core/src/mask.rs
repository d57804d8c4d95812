pub const VISIBLE_PREFIX_CHARS: usize = 8;

const SENSITIVE_MARKERS: [&str; 2] = ["SECRET", "CLIENT_ID"];

pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_MARKERS
        .iter()
        .any(|marker| name.contains(marker))
}

pub fn mask_value(value: &str) -> String {
    let mut output = value.chars().take(VISIBLE_PREFIX_CHARS).collect::<String>();
    output.push_str("...");
    output
}

pub fn display_value(name: &str, value: &str) -> String {
    if is_sensitive(name) {
        return mask_value(value);
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_and_client_ids_are_masked() {
        assert_eq!(
            display_value("OAUTH2_CLIENT_SECRET", "abcdefghijklmnop"),
            "abcdefgh..."
        );
        assert_eq!(
            display_value("OAUTH2_CLIENT_ID", "client-1234567"),
            "client-1..."
        );
    }

    #[test]
    fn other_values_print_in_full() {
        assert_eq!(
            display_value("PULSAR_TOPIC", "persistent://public/default/events"),
            "persistent://public/default/events"
        );
        assert_eq!(display_value("OAUTH2_SCOPE", "read"), "read");
    }

    #[test]
    fn short_values_keep_fixed_suffix() {
        assert_eq!(mask_value("abc"), "abc...");
        assert_eq!(mask_value(""), "...");
    }

    #[test]
    fn masking_respects_char_boundaries() {
        assert_eq!(mask_value("ééééééééééé"), "éééééééé...");
    }
}
