use media_fetch_bot::flow::choice::Choice;
use media_fetch_bot::links::{extract_link, is_supported_link, SUPPORTED_DOMAINS};
use proptest::prelude::*;

fn mentions_supported_domain(text: &str) -> bool {
    let lower = text.to_lowercase();
    SUPPORTED_DOMAINS.iter().any(|d| lower.contains(d))
}

proptest! {
    #[test]
    fn text_without_domain_is_never_supported(text in "[a-z0-9 ./:?=]{0,64}") {
        prop_assume!(!mentions_supported_domain(&text));
        prop_assert!(!is_supported_link(&text));
        prop_assert_eq!(extract_link(&text), None);
    }

    #[test]
    fn any_domain_in_any_case_is_supported(
        idx in 0..SUPPORTED_DOMAINS.len(),
        prefix in "[a-z]{0,10}",
        suffix in "[a-z0-9/]{0,20}",
        upper in any::<bool>(),
    ) {
        let domain = if upper {
            SUPPORTED_DOMAINS[idx].to_uppercase()
        } else {
            SUPPORTED_DOMAINS[idx].to_string()
        };
        let url = format!("https://{prefix}{domain}/{suffix}");
        prop_assert!(is_supported_link(&url));

        let message = format!("look at this {url} please");
        prop_assert_eq!(extract_link(&message), Some(url.as_str()));
    }

    #[test]
    fn unknown_tokens_never_parse(token in "[a-z_0-9]{0,16}") {
        let known = ["quality_720", "quality_480", "quality_360", "audio_mp3", "cancel"];
        prop_assume!(!known.contains(&token.as_str()));
        prop_assert_eq!(Choice::from_token(&token), None);
    }
}
