//! Property-based test generators using proptest.

use proptest::prelude::*;
use tether_protocol::{HttpMethod, Record, RequestDescriptor, Timestamp};

/// Strategy for queue priorities, small enough to produce ties.
pub fn priority_strategy() -> impl Strategy<Value = i32> {
    -2i32..6
}

/// Strategy for HTTP methods.
pub fn method_strategy() -> impl Strategy<Value = HttpMethod> {
    prop_oneof![
        Just(HttpMethod::Get),
        Just(HttpMethod::Post),
        Just(HttpMethod::Put),
        Just(HttpMethod::Patch),
        Just(HttpMethod::Delete),
    ]
}

/// Strategy for request descriptors.
pub fn descriptor_strategy() -> impl Strategy<Value = RequestDescriptor> {
    (
        method_strategy(),
        prop::string::string_regex("/[a-z]{1,8}(/[0-9]{1,4})?").expect("Invalid regex"),
        prop::option::of(prop::string::string_regex("\\{\"n\":[0-9]{1,3}\\}").expect("Invalid regex")),
        priority_strategy(),
    )
        .prop_map(|(method, url, body, priority)| {
            let descriptor = RequestDescriptor::new(method, url).with_priority(priority);
            match body {
                Some(body) => descriptor.with_body(body),
                None => descriptor,
            }
        })
}

/// Strategy for synced records with a `title` column.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    (
        prop::string::string_regex("[a-z0-9]{1,12}").expect("Invalid regex"),
        0i64..2_000,
        prop::string::string_regex("[A-Za-z ]{0,16}").expect("Invalid regex"),
    )
        .prop_map(|(id, at, title)| {
            Record::new(id, Timestamp::from_millis(at)).with_field("title", title)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn records_are_well_formed(record in record_strategy()) {
            prop_assert!(!record.id.is_empty());
            prop_assert!(record.field("title").is_some());
        }

        #[test]
        fn descriptors_have_paths(descriptor in descriptor_strategy()) {
            prop_assert!(descriptor.url.starts_with('/'));
        }
    }
}
