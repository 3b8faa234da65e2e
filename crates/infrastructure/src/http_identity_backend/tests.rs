use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};

use skyward_application::{CreateAgencyInput, IdentityBackend, PageToken, UpdateAgencyInput};
use skyward_core::{AppError, BackendFailure};
use skyward_domain::{AttachmentScope, RoleScope};

use crate::http_api_client::HttpApiClient;

use super::{HttpIdentityBackend, IdentityEndpoints};

const TOKEN: &str = "token-123";

fn backend(server: &ServerGuard) -> HttpIdentityBackend {
    let base = server.url();
    let endpoints = match IdentityEndpoints::parse(
        &format!("{base}/v3.0"),
        &format!("{base}/v3"),
        &format!("{base}/v3/auth"),
    ) {
        Ok(endpoints) => endpoints,
        Err(error) => panic!("endpoints must parse: {error}"),
    };
    let client = match HttpApiClient::new(TOKEN, Duration::from_secs(5)) {
        Ok(client) => client,
        Err(error) => panic!("client must build: {error}"),
    };
    HttpIdentityBackend::new(client, endpoints)
}

#[tokio::test]
async fn project_listing_sends_token_and_exposes_next_link() {
    let mut server = Server::new_async().await;
    let next = format!("{}/v3/projects?domain_id=d-1&marker=p-2", server.url());
    let first = server
        .mock("GET", "/v3/projects")
        .match_query(Matcher::Exact("domain_id=d-1".into()))
        .match_header("x-auth-token", TOKEN)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"projects":[{{"id":"p-1","name":"eu-west-0"}},{{"id":"p-2","name":"eu-north-0"}}],"links":{{"next":"{next}"}}}}"#
        ))
        .create_async()
        .await;
    let second = server
        .mock("GET", "/v3/projects")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("domain_id".into(), "d-1".into()),
            Matcher::UrlEncoded("marker".into(), "p-2".into()),
        ]))
        .match_header("x-auth-token", TOKEN)
        .with_status(200)
        .with_body(r#"{"projects":[{"id":"p-3","name":"ap-southeast-1"}],"links":{"next":null}}"#)
        .create_async()
        .await;
    let backend = backend(&server);

    let page = backend.list_projects("d-1", None).await;
    let Ok(page) = page else {
        panic!("first page must load");
    };
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.next, Some(PageToken::new(next)));

    let last = backend.list_projects("d-1", page.next).await;
    let Ok(last) = last else {
        panic!("second page must load");
    };
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.next, None);

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn next_link_to_another_origin_is_not_followed() {
    let server = Server::new_async().await;
    let mut foreign = Server::new_async().await;
    let foreign_mock = foreign
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let backend = backend(&server);
    let next = PageToken::new(format!("{}/v3/projects?marker=p-2", foreign.url()));

    let result = backend.list_projects("d-1", Some(next)).await;

    assert!(matches!(
        result,
        Err(AppError::Backend(ref error)) if error.failure() == BackendFailure::MalformedResponse
    ));
    foreign_mock.assert_async().await;
}

#[tokio::test]
async fn custom_role_listing_filters_by_domain() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v3/roles")
        .match_query(Matcher::UrlEncoded("domain_id".into(), "d-1".into()))
        .with_status(200)
        .with_body(r#"{"roles":[{"id":"r-1","display_name":"ops"},{"id":"r-2"}],"links":{}}"#)
        .create_async()
        .await;
    let backend = backend(&server);

    let page = backend
        .list_roles(&RoleScope::Domain("d-1".to_owned()), None)
        .await;

    let Ok(page) = page else {
        panic!("role listing must load");
    };
    assert_eq!(page.items[0].display_name.as_deref(), Some("ops"));
    assert_eq!(page.items[1].display_name, None);
    assert_eq!(page.next, None);
    mock.assert_async().await;
}

#[tokio::test]
async fn domain_listing_uses_the_auth_endpoint() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v3/auth/domains")
        .match_query(Matcher::UrlEncoded("name".into(), "acme".into()))
        .with_status(200)
        .with_body(r#"{"domains":[{"id":"d-1","name":"acme"}]}"#)
        .create_async()
        .await;
    let backend = backend(&server);

    let page = backend.list_domains("acme", None).await;

    assert!(matches!(page, Ok(ref page) if page.items.len() == 1 && page.next.is_none()));
    mock.assert_async().await;
}

#[tokio::test]
async fn create_agency_posts_the_envelope() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v3.0/OS-AGENCY/agencies")
        .match_header("x-auth-token", TOKEN)
        .match_body(Matcher::Json(serde_json::json!({
            "agency": {
                "name": "ops",
                "domain_id": "d-1",
                "trust_domain_name": "partner",
            }
        })))
        .with_status(201)
        .with_body(
            r#"{"agency":{"id":"a-1","name":"ops","domain_id":"d-1","trust_domain_id":"t-1","trust_domain_name":"partner","description":"","duration":"FOREVER","create_time":"2026-10-16T08:00:00.000000"}}"#,
        )
        .create_async()
        .await;
    let backend = backend(&server);

    let agency = backend
        .create_agency(CreateAgencyInput {
            name: "ops".to_owned(),
            domain_id: "d-1".to_owned(),
            trust_domain_name: "partner".to_owned(),
            description: None,
        })
        .await;

    let Ok(agency) = agency else {
        panic!("create must succeed");
    };
    assert_eq!(agency.id, "a-1");
    assert_eq!(agency.description, None);
    assert_eq!(agency.duration.as_deref(), Some("FOREVER"));
    assert_eq!(agency.expire_time, None);
    mock.assert_async().await;
}

#[tokio::test]
async fn update_agency_sends_only_set_fields() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/v3.0/OS-AGENCY/agencies/a-1")
        .match_body(Matcher::Json(serde_json::json!({
            "agency": { "description": "" }
        })))
        .with_status(200)
        .with_body(
            r#"{"agency":{"id":"a-1","name":"ops","domain_id":"d-1","trust_domain_name":"partner"}}"#,
        )
        .create_async()
        .await;
    let backend = backend(&server);

    let agency = backend
        .update_agency(
            "a-1",
            UpdateAgencyInput {
                trust_domain_name: None,
                description: Some(String::new()),
            },
        )
        .await;

    assert!(matches!(agency, Ok(ref agency) if agency.description.is_none()));
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_agency_maps_to_not_found() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v3.0/OS-AGENCY/agencies/a-404")
        .with_status(404)
        .with_body(r#"{"error":{"message":"agency not found"}}"#)
        .create_async()
        .await;
    let backend = backend(&server);

    let result = backend.get_agency("a-404").await;

    let Err(error) = result else {
        panic!("lookup must fail");
    };
    assert!(error.is_backend_not_found());
    mock.assert_async().await;
}

#[tokio::test]
async fn unexpected_status_carries_code_and_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("DELETE", "/v3.0/OS-AGENCY/agencies/a-1")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;
    let backend = backend(&server);

    let result = backend.delete_agency("a-1").await;

    let Err(AppError::Backend(error)) = result else {
        panic!("delete must fail with a backend error");
    };
    assert_eq!(error.failure(), BackendFailure::Status(503));
    assert!(error.to_string().ends_with("maintenance"));
    mock.assert_async().await;
}

#[tokio::test]
async fn malformed_body_is_reported() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v3.0/OS-AGENCY/agencies/a-1")
        .with_status(200)
        .with_body("<html>")
        .create_async()
        .await;
    let backend = backend(&server);

    let result = backend.get_agency("a-1").await;

    assert!(matches!(
        result,
        Err(AppError::Backend(ref error)) if error.failure() == BackendFailure::MalformedResponse
    ));
}

#[tokio::test]
async fn role_attachment_paths_follow_the_scope() {
    let mut server = Server::new_async().await;
    let attach = server
        .mock("PUT", "/v3.0/OS-AGENCY/projects/p-1/agencies/a-1/roles/r-1")
        .with_status(204)
        .create_async()
        .await;
    let detach = server
        .mock("DELETE", "/v3.0/OS-AGENCY/domains/d-1/agencies/a-1/roles/r-2")
        .with_status(204)
        .create_async()
        .await;
    let listed = server
        .mock("GET", "/v3.0/OS-AGENCY/projects/p-1/agencies/a-1/roles")
        .with_status(200)
        .with_body(r#"{"roles":[{"id":"r-1","display_name":"ops"}]}"#)
        .create_async()
        .await;
    let backend = backend(&server);
    let project = AttachmentScope::Project("p-1".to_owned());

    assert!(backend.attach_role("a-1", &project, "r-1").await.is_ok());
    assert!(
        backend
            .detach_role("a-1", &AttachmentScope::Domain("d-1".to_owned()), "r-2")
            .await
            .is_ok()
    );
    let roles = backend.list_attached_roles("a-1", &project).await;
    assert!(matches!(roles, Ok(ref roles) if roles.len() == 1));

    attach.assert_async().await;
    detach.assert_async().await;
    listed.assert_async().await;
}
