use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	info(title = "edu-journal", description = "Academic records behind role-based access control"),
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::users::list_users,
		routes::users::get_user,
		routes::users::update_user,
		routes::users::delete_user,
		routes::teachers::create_teacher,
		routes::teachers::list_teachers,
		routes::teachers::get_teacher,
		routes::teachers::update_teacher,
		routes::teachers::delete_teacher,
		routes::teachers::get_own_profile,
		routes::teachers::update_own_profile,
		routes::teachers::list_public_teachers,
		routes::teachers::get_public_teacher,
		routes::students::create_student,
		routes::students::list_students,
		routes::students::get_student,
		routes::students::update_student,
		routes::students::delete_student,
		routes::students::list_public_students,
		routes::students::get_public_student,
		routes::student_groups::create_group,
		routes::student_groups::list_groups,
		routes::student_groups::get_group,
		routes::student_groups::update_group,
		routes::student_groups::delete_group,
		routes::student_groups::list_public_groups,
		routes::student_groups::get_public_group,
		routes::permissions::create_permission,
		routes::permissions::list_permissions,
		routes::permissions::get_permission,
		routes::permissions::update_permission,
		routes::permissions::delete_permission,
		routes::roles::create_role,
		routes::roles::list_roles,
		routes::roles::get_role,
		routes::roles::update_role,
		routes::roles::delete_role,
		routes::user_roles::assign_role,
		routes::user_roles::remove_role,
		routes::user_roles::list_user_roles,
		routes::role_permissions::assign_permission,
		routes::role_permissions::remove_permission,
		routes::role_permissions::list_role_permissions,
		routes::curricula::create_curriculum,
		routes::curricula::list_curricula,
		routes::curricula::get_curriculum,
		routes::curricula::update_curriculum,
		routes::curricula::delete_curriculum,
		routes::grade_journals::create_grade,
		routes::grade_journals::list_grades,
		routes::grade_journals::list_public_grades,
		routes::grade_journals::average_grade,
		routes::grade_journals::get_grade,
		routes::grade_journals::update_grade,
		routes::grade_journals::delete_grade,
		routes::attendances::create_attendance,
		routes::attendances::list_attendances,
		routes::attendances::get_attendance,
		routes::attendances::update_attendance,
		routes::attendances::delete_attendance,
		routes::semesters::create_semester,
		routes::semesters::list_semesters,
		routes::semesters::get_semester,
		routes::semesters::update_semester,
		routes::semesters::delete_semester,
		routes::disciplines::create_discipline,
		routes::disciplines::list_disciplines,
		routes::disciplines::get_discipline,
		routes::disciplines::update_discipline,
		routes::disciplines::delete_discipline,
		routes::disciplines::list_public_disciplines,
		routes::disciplines::get_public_discipline,
		routes::academic_years::create_year,
		routes::academic_years::list_years,
		routes::academic_years::get_year,
		routes::academic_years::update_year,
		routes::academic_years::delete_year,
		routes::audit_logs::list_audit_logs
	),
	components(
		schemas(
			routes::health::HealthResponse,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::user::UserUpdateRequest,
			models::rbac::Role,
			models::rbac::RoleRequest,
			models::rbac::Permission,
			models::rbac::PermissionRequest,
			models::rbac::UserRole,
			models::rbac::UserRoleRequest,
			models::rbac::RolePermission,
			models::rbac::RolePermissionRequest,
			models::teacher::Teacher,
			models::teacher::TeacherCreateRequest,
			models::teacher::TeacherUpdateRequest,
			models::teacher::TeacherPublic,
			models::student::Student,
			models::student::StudentCreateRequest,
			models::student::StudentUpdateRequest,
			models::student::StudentPublic,
			models::student_group::StudentGroup,
			models::student_group::StudentGroupRequest,
			models::student_group::StudentGroupPublic,
			models::academic_year::AcademicYear,
			models::academic_year::AcademicYearRequest,
			models::semester::Semester,
			models::semester::SemesterRequest,
			models::discipline::Discipline,
			models::discipline::DisciplineRequest,
			models::discipline::DisciplinePublic,
			models::curriculum::Curriculum,
			models::curriculum::CurriculumRequest,
			models::grade_journal::GradeJournal,
			models::grade_journal::GradeJournalRequest,
			models::grade_journal::GradeJournalPublic,
			models::grade_journal::AverageGrade,
			models::attendance::Attendance,
			models::attendance::AttendanceRequest,
			models::audit_log::AuditLog
		)
	),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "Auth", description = "Registration, login and the caller's profile"),
		(name = "Users", description = "User administration"),
		(name = "Teachers", description = "Teacher profiles"),
		(name = "Students", description = "Student profiles"),
		(name = "Student groups", description = "Groups and their curators"),
		(name = "RBAC", description = "Roles, permissions and their assignments"),
		(name = "Calendar", description = "Academic years and semesters"),
		(name = "Disciplines", description = "Disciplines taught to groups"),
		(name = "Curricula", description = "Subjects per discipline and semester"),
		(name = "Grades", description = "Grade journal"),
		(name = "Attendance", description = "Attendance journal"),
		(name = "Audit", description = "Hash-chained audit trail")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc)?;
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

/// Serves the document as JSON at `/api-docs/openapi.json`.
pub fn openapi_routes<S>(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router<S>>
where
	S: Clone + Send + Sync + 'static,
{
	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new().route("/api-docs/openapi.json", json_route))
}

fn ensure_security_components(doc: &mut Value) -> anyhow::Result<()> {
	let root = doc
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI root must be an object"))?;

	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("components must be an object"))?;

	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("securitySchemes must be an object"))?;

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);

	Ok(())
}

fn add_examples(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		for item in paths.values_mut() {
			if let Some(operations) = item.as_object_mut() {
				for operation in operations.values_mut() {
					apply_parameter_examples(operation);
					apply_request_examples(operation);
				}
			}
		}
	}
}

fn apply_parameter_examples(operation: &mut Value) {
	let Some(parameters) = operation.get_mut("parameters").and_then(Value::as_array_mut) else { return; };

	for parameter in parameters.iter_mut() {
		let example = match parameter.get("name").and_then(Value::as_str) {
			Some("id") => json!(1),
			Some("limit") => json!(20),
			Some("offset") => json!(0),
			Some("from_date") => json!("2024-09-01"),
			Some("to_date") => json!("2024-12-31"),
			_ => continue,
		};
		if let Some(obj) = parameter.as_object_mut() {
			obj.entry("example").or_insert(example);
		}
	}
}

fn apply_request_examples(operation: &mut Value) {
	let Some(request_body) = operation.get_mut("requestBody") else { return; };
	let Some(content) = request_body.get_mut("content").and_then(Value::as_object_mut) else { return; };
	let Some(app_json) = content.get_mut("application/json").and_then(Value::as_object_mut) else { return; };
	let Some(schema) = app_json.get("schema").and_then(Value::as_object) else { return; };
	let Some(reference) = schema.get("$ref").and_then(Value::as_str) else { return; };

	let example = match reference {
		"#/components/schemas/LoginRequest" => Some(json!({
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		})),
		"#/components/schemas/RegisterRequest" => Some(json!({
			"first_name": "Ada",
			"last_name": "Lovelace",
			"middle_name": null,
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		})),
		"#/components/schemas/UserRoleRequest" => Some(json!({
			"user_id": 2,
			"role_id": 1
		})),
		"#/components/schemas/RolePermissionRequest" => Some(json!({
			"role_id": 1,
			"permission_id": 7
		})),
		"#/components/schemas/GradeJournalRequest" => Some(json!({
			"student_id": 5,
			"discipline_id": 3,
			"grade": 87,
			"comment": "midterm"
		})),
		"#/components/schemas/AttendanceRequest" => Some(json!({
			"student_id": 5,
			"discipline_id": 3,
			"visit": true,
			"comment": null
		})),
		_ => None,
	};

	if let Some(example) = example {
		app_json.insert("example".to_string(), example);
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let tls_enabled = std::env::var("TLS_CERT_PATH").is_ok() && std::env::var("TLS_KEY_PATH").is_ok();
	let scheme = if tls_enabled { "https" } else { "http" };
	let server_url = format!("{}://localhost:{}", scheme, port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
