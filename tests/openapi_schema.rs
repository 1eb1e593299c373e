use serde_json::Value;

fn schema_properties<'a>(doc: &'a Value, name: &str) -> &'a serde_json::Map<String, Value> {
    doc.get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(|s| s.get(name))
        .and_then(|t| t.get("properties"))
        .and_then(Value::as_object)
        .unwrap_or_else(|| panic!("components.schemas.{name}.properties must exist"))
}

#[test]
fn openapi_exposes_grade_and_rbac_schemas() -> anyhow::Result<()> {
    let doc = edu_journal::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let grade = schema_properties(&v, "GradeJournal");
    for k in ["grade_journal_id", "student_id", "discipline_id", "grade", "comment"] {
        assert!(grade.contains_key(k), "GradeJournal schema missing '{}'", k);
    }

    let link = schema_properties(&v, "UserRoleRequest");
    assert!(link.contains_key("user_id") && link.contains_key("role_id"));

    let user = schema_properties(&v, "User");
    assert!(!user.contains_key("password_hash"), "password hash leaked into the User schema");

    Ok(())
}

#[test]
fn public_routes_carry_no_security_requirement() -> anyhow::Result<()> {
    let v = serde_json::to_value(edu_journal::docs::build_openapi(8000)?)?;

    for path in ["/api/v1/login", "/api/v1/register", "/api/health"] {
        let op = v["paths"][path]
            .as_object()
            .and_then(|item| item.values().next())
            .unwrap_or_else(|| panic!("{path} not documented"));
        assert!(op.get("security").is_none(), "{path} should be public");
    }

    let guarded = &v["paths"]["/api/v1/gradejournals/{id}"]["delete"];
    assert!(guarded.get("security").is_some(), "grade delete must require a bearer token");

    Ok(())
}
