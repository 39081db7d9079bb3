use ctf_cli::{models::Challenge, utils::string_to_safe_path};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn update() -> impl Strategy<Value = Challenge> {
    (
        "[a-z ]{1,12}",
        0_i64..1000,
        0_i64..100,
        any::<bool>(),
        proptest::option::of("[a-z ]{0,16}"),
        proptest::option::of("nc [a-z]{1,8} [0-9]{2,5}"),
        proptest::option::of(proptest::collection::vec("https://[a-z]{1,8}/[a-z]{1,8}", 0..3)),
    )
        .prop_map(
            |(name, value, solves, solved, description, connection, files)| Challenge {
                id: "0".to_string(),
                name,
                category: "pwn".to_string(),
                value,
                solves,
                solved,
                description,
                connection,
                files,
            },
        )
}

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn merge_fold_is_last_write_wins_per_field(updates in proptest::collection::vec(update(), 1..8)) {
        let merged = updates
            .iter()
            .cloned()
            .fold(None, |acc: Option<Challenge>, new| Some(Challenge::merged(acc.as_ref(), new)))
            .unwrap();

        let last = updates.last().unwrap();
        prop_assert_eq!(&merged.name, &last.name);
        prop_assert_eq!(merged.value, last.value);
        prop_assert_eq!(merged.solves, last.solves);
        prop_assert_eq!(merged.solved, last.solved);
        prop_assert_eq!(
            merged.description,
            updates.iter().rev().find_map(|u| u.description.clone())
        );
        prop_assert_eq!(
            merged.connection,
            updates.iter().rev().find_map(|u| u.connection.clone())
        );
        prop_assert_eq!(
            merged.files,
            updates.iter().rev().find_map(|u| u.files.clone())
        );
    }

    #[test]
    fn safe_paths_are_idempotent_and_restricted(name in "\\PC{0,32}") {
        let once = string_to_safe_path(&name);
        prop_assert_eq!(string_to_safe_path(&once), once.clone());
        prop_assert!(once.chars().all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-')));
        prop_assert!(!once.starts_with('_') && !once.ends_with('_'));
        prop_assert!(!once.contains("__"));
    }
}
