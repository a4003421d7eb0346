use taskdeck::error::{exit_codes, Error, ErrorNotice};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::validation("title", "cannot be empty");
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let missing = Error::NotFound("01h".to_string());
    assert_eq!(missing.exit_code(), exit_codes::USER_ERROR);

    let op = Error::StorageUnavailable("offline".to_string());
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn validation_error_details_name_the_field() {
    let err = Error::validation("endDate", "2024-01-01 is before start date 2024-02-01");
    assert!(err.to_string().contains("Invalid endDate"));
    assert_eq!(err.details().unwrap()["field"], "endDate");
}

#[test]
fn notice_carries_stable_kind() {
    let notice = ErrorNotice::from(&Error::StorageCorrupt("bad json".to_string()));
    assert_eq!(notice.kind, "storage_corrupt");
    assert!(notice.message.contains("bad json"));
}
