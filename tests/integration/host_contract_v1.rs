use piggy::host::contract::{
    CommandEnvelope, CommandName, ContractErrorKind, EVENT_VERSION, EventEnvelope,
    ResponseEnvelope,
};

#[test]
fn command_name_parse_known_and_unknown() {
    assert_eq!(CommandName::parse("bank.status"), Some(CommandName::BankStatus));
    assert_eq!(
        CommandName::parse("bank.catch_up"),
        Some(CommandName::BankCatchUp)
    );
    assert_eq!(
        CommandName::parse("host.readiness"),
        Some(CommandName::HostReadiness)
    );
    assert_eq!(
        CommandName::parse("runtime.stop"),
        Some(CommandName::RuntimeStop)
    );
    assert!(CommandName::parse("runtime.start").is_none());

    assert_eq!(CommandName::BankSetAmount.as_str(), "bank.set_amount");
    assert_eq!(CommandName::BankSetPeriod.as_str(), "bank.set_period");
    assert_eq!(CommandName::HostActivity.as_str(), "host.activity");
}

#[test]
fn command_envelope_validates_version() {
    let mut envelope = CommandEnvelope::new(
        "req-1",
        CommandName::BankSetAmount,
        serde_json::json!({"amount": 0.25}),
    );
    assert!(envelope.validate().is_ok());

    envelope.v = EVENT_VERSION + 1;
    let err = envelope.validate().unwrap_err();
    assert_eq!(err.kind, ContractErrorKind::UnsupportedVersion);
}

#[test]
fn envelopes_serialize_with_wire_names() {
    let envelope = CommandEnvelope::new("req-2", CommandName::BankToggle, serde_json::json!({}));
    let json = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json["command"], "bank.toggle");
    assert_eq!(json["v"], EVENT_VERSION);

    let event = EventEnvelope::new(
        "evt-1",
        "bank.balance_changed",
        serde_json::json!({"balance": 150}),
    );
    let parsed: EventEnvelope =
        serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
    assert_eq!(parsed, event);

    let resp = ResponseEnvelope::error("req-3", "nope");
    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"], "nope");
}
