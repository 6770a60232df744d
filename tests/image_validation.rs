// tests/image_validation.rs

use proptest::prelude::*;

use nodevisor::backend::sanitize_image_name;
use nodevisor::errors::NodevisorError;

#[test]
fn plain_names_are_accepted() {
    for image in [
        "centos",
        "yarn-test-image",
        "ubuntu:22.04",
        "team/app",
        "registry.example.com/app:1.2.3",
        "registry.example.com:5000/app_v2",
        "localhost:5000/app:latest",
    ] {
        assert_eq!(sanitize_image_name(image).unwrap(), image, "{image}");
    }
}

#[test]
fn quotes_are_stripped_before_validation() {
    assert_eq!(sanitize_image_name("'centos'").unwrap(), "centos");
    assert_eq!(sanitize_image_name("\"centos:7\"").unwrap(), "centos:7");
}

#[test]
fn shell_injection_is_rejected() {
    for image in [
        "repo.com/image rm -rf /*",
        "bad repo rm -rf /",
        "centos;reboot",
        "centos && id",
        "$(id)",
        "`id`",
        "a/b/c",
        "image|cat",
    ] {
        match sanitize_image_name(image) {
            Err(NodevisorError::InvalidImage { image: reported, .. }) => {
                assert_eq!(reported, image);
            }
            other => panic!("expected InvalidImage for {image:?}, got {other:?}"),
        }
    }
}

#[test]
fn non_ascii_names_are_rejected() {
    for image in ["café", "café/ïmage:тег", "registry.例え/app", "app:版本"] {
        assert!(
            matches!(sanitize_image_name(image), Err(NodevisorError::InvalidImage { .. })),
            "accepted {image:?}"
        );
    }
}

#[test]
fn empty_image_is_rejected() {
    assert!(matches!(
        sanitize_image_name(""),
        Err(NodevisorError::InvalidImage { .. })
    ));
    assert!(matches!(
        sanitize_image_name("''"),
        Err(NodevisorError::InvalidImage { .. })
    ));
}

proptest! {
    #[test]
    fn generated_valid_names_are_accepted(
        registry in proptest::option::of("[a-z0-9][a-z0-9.-]{0,15}(:[0-9]{1,5})?"),
        name in "[A-Za-z0-9_][A-Za-z0-9_.-]{0,20}",
        tag in proptest::option::of("[A-Za-z0-9_.-]{1,10}"),
    ) {
        let mut image = String::new();
        if let Some(r) = &registry {
            image.push_str(r);
            image.push('/');
        }
        image.push_str(&name);
        if let Some(t) = &tag {
            image.push(':');
            image.push_str(t);
        }
        prop_assert_eq!(sanitize_image_name(&image).unwrap(), image);
    }

    #[test]
    fn names_with_shell_metacharacters_are_rejected(
        prefix in "[a-z0-9]{1,10}",
        meta in prop::sample::select(vec![" ", ";", "&", "|", "$", "`", "(", ")", "<", ">", "*", "\\", "!", "\t"]),
        suffix in "[a-z0-9]{1,10}",
    ) {
        let image = format!("{prefix}{meta}{suffix}");
        let rejected = matches!(
            sanitize_image_name(&image),
            Err(NodevisorError::InvalidImage { .. })
        );
        prop_assert!(rejected, "accepted {:?}", image);
    }

    #[test]
    fn names_with_non_ascii_letters_are_rejected(
        prefix in "[a-z0-9]{0,10}",
        letter in "[\u{00C0}-\u{024F}\u{0400}-\u{04FF}\u{4E00}-\u{4FFF}]",
        suffix in "[a-z0-9]{0,10}",
    ) {
        let image = format!("{prefix}{letter}{suffix}");
        let rejected = matches!(
            sanitize_image_name(&image),
            Err(NodevisorError::InvalidImage { .. })
        );
        prop_assert!(rejected, "accepted {:?}", image);
    }
}
