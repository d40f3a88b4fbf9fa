#[cfg(test)]
mod tests {
    use leafsync_engine::Sanitizer;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn sanitizing_is_idempotent(raw in ".*") {
            let sanitizer = Sanitizer::default();
            let once = sanitizer.sanitize(&raw).into_owned();
            prop_assert!(sanitizer.is_clean(&once));
            prop_assert_eq!(sanitizer.sanitize(&once), once.as_str());
            prop_assert_eq!(once.chars().count(), raw.chars().count());
        }

        #[test]
        fn clean_input_is_unchanged(raw in "[a-zA-Z0-9._ -]*") {
            let sanitizer = Sanitizer::default();
            prop_assert_eq!(sanitizer.sanitize(&raw), raw.as_str());
        }

        #[test]
        fn joined_segments_are_never_empty(parent in "[a-z]{1,8}(\\.[a-z]{1,8}){0,3}", segment in "[^.]{0,6}") {
            let sanitizer = Sanitizer::default();
            let joined = sanitizer.join(Some(&parent), &segment);
            prop_assert!(joined.starts_with(&parent));
            prop_assert!(joined.split('.').all(|s| !s.is_empty()));
            prop_assert!(sanitizer.is_clean(&joined));
        }
    }
}
