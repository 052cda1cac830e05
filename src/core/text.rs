pub fn truncate_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }

    let mut cut = max_len;
    while cut > 0 && !value.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = value[..cut].to_string();
    out.push_str("...[truncated]");
    out
}

#[cfg(test)]
mod tests {
    use super::truncate_log;

    #[test]
    fn keeps_short_values() {
        assert_eq!(truncate_log("short", 10), "short");
    }

    #[test]
    fn cuts_on_char_boundary() {
        let out = truncate_log("ééé", 3);
        assert_eq!(out, "é...[truncated]");
    }
}
