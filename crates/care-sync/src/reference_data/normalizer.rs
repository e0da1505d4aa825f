/// Case-, whitespace- and BOM-insensitive form used for name comparisons.
pub fn normalize_name(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::normalize_name;

    #[test]
    fn normalize_name_removes_whitespace_and_case() {
        let source = "\u{feff}Medicin  Administration \u{200b} ";
        assert_eq!(normalize_name(source), "medicin administration");
    }

    #[test]
    fn normalize_name_lowercases_danish_letters() {
        assert_eq!(normalize_name("ÆNDRET Sårpleje"), "ændret sårpleje");
    }
}
