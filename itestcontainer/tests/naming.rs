//! Property tests for flag parsing and volume naming.

use itestcontainer::runtime::options::{parse_labels, parse_volumes, split_list};
use itestcontainer::runtime::volumes::{VolumeNamer, volume_name, volume_suffix};
use itestcontainer::PortSpec;
use proptest::prelude::*;

proptest! {
    #[test]
    fn volume_names_always_carry_prefix(base in "[a-z0-9_-]{1,32}", target in ".{0,64}") {
        let suffix = volume_suffix(Some(target.as_str()));
        let name = volume_name(&base, suffix.as_deref());
        prop_assert!(name.starts_with("bazel-itest-"));
        prop_assert!(name.contains(&base));
        match suffix {
            Some(suffix) => {
                prop_assert_eq!(suffix.len(), 64);
                let expected_suffix = format!("-{}", suffix);
                prop_assert!(name.ends_with(&expected_suffix));
            }
            None => prop_assert!(target.is_empty()),
        }
    }

    #[test]
    fn suffix_is_a_function_of_the_target(target in "//[a-z/]{1,20}:[a-z_]{1,20}") {
        let a = VolumeNamer::new(Some(target.as_str()));
        let b = VolumeNamer::new(Some(target.as_str()));
        prop_assert_eq!(a.name("data"), b.name("data"));
    }

    #[test]
    fn split_list_never_yields_empty(raw in "[a,]{0,20}") {
        prop_assert!(split_list(&raw).all(|entry| !entry.is_empty()));
    }

    #[test]
    fn container_port_round_trips(port in 1u16.., host in proptest::option::of(1u16..)) {
        let raw = match host {
            Some(host) => format!("{host}:{port}"),
            None => port.to_string(),
        };
        let spec: PortSpec = raw.parse().unwrap();
        prop_assert_eq!(spec.container_port, port);
        prop_assert_eq!(spec.host_port, host);
    }

    #[test]
    fn volume_target_keeps_everything_after_first_colon(
        name in "[a-z]{1,10}",
        path in "/[a-z:/]{0,20}",
    ) {
        let volumes = parse_volumes(&format!("{name}:{path}")).unwrap();
        prop_assert_eq!(volumes.len(), 1);
        prop_assert_eq!(&volumes[0].name, &name);
        prop_assert_eq!(&volumes[0].target, &path);
    }

    #[test]
    fn label_value_keeps_everything_after_first_equals(
        key in "[a-z.]{1,10}",
        value in "[a-z=]{0,10}",
    ) {
        let labels = parse_labels(&format!("{key}={value}")).unwrap();
        prop_assert_eq!(&labels[&key], &value);
    }
}
