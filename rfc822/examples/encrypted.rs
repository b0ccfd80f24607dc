use std::sync::Arc;

use envelope::{KeyInfo, NativeKeyPrimitives, DEFAULT_ALGORITHM};
use rfc822::{EmailAddress, EncryptionStatus, InternetMessageFields, Rfc822Codec};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut keys = NativeKeyPrimitives::new();
    keys.generate_key_pair("bob").unwrap();
    let bob = keys.public_key_info("bob", DEFAULT_ALGORITHM).unwrap();

    let codec = Rfc822Codec::new().with_key_primitives(Arc::new(keys));

    let fields = InternetMessageFields::new()
        .with_from([EmailAddress::new("alice@localhost").with_display_name("Alice")])
        .with_to([EmailAddress::new("bob@localhost").with_display_name("Bob")])
        .with_subject("Secret plans")
        .with_body("Meet me at noon.");

    let bytes = codec
        .process_message_data(&fields, EncryptionStatus::Encrypted, &[bob])
        .unwrap();

    println!("================================");
    println!("ENCRYPTED MESSAGE");
    println!("================================");
    println!();
    println!("{}", String::from_utf8_lossy(&bytes));

    let opened = codec
        .open_message_data(&bytes, &KeyInfo::private_key("bob", DEFAULT_ALGORITHM))
        .unwrap();

    println!("================================");
    println!("OPENED MESSAGE");
    println!("================================");
    println!();
    println!("{opened:#?}");
}
