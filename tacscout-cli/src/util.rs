pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" 2801, ,2802,  2803 ");
        assert_eq!(parts, vec!["2801", "2802", "2803"]);
        assert!(split_csv("").is_empty());
    }
}
