use actix_web::{
    cookie::Cookie,
    http::{StatusCode, header},
    test::{TestRequest, call_service, read_body},
};
use rstest::rstest;

use super::*;
use crate::auth::jwt::generate_refresh_token;
use crate::model::role::Role;
use crate::test_support::{register, test_app, test_state};

#[rstest]
#[case("/admin", Area::Admin)]
#[case("/admin/users", Area::Admin)]
#[case("/administrator", Area::Admin)]
#[case("/employee/dashboard", Area::Employee)]
#[case("/", Area::Employee)]
fn area_is_chosen_by_path_prefix(#[case] path: &str, #[case] expected: Area) {
    assert_eq!(Area::from_path(path), expected);
}

#[test]
fn each_area_has_its_own_navigation() {
    let admin: Vec<&str> = sidebar_links(Area::Admin, "/admin/dashboard")
        .iter()
        .map(|l| l.label)
        .collect();
    assert_eq!(admin, ["Dashboard", "Leave Requests", "Manage Employees"]);

    let employee: Vec<&str> = sidebar_links(Area::Employee, "/employee/dashboard")
        .iter()
        .map(|l| l.href)
        .collect();
    assert_eq!(employee, ["/employee/dashboard", "/employee/request-leave"]);
}

#[rstest]
#[case("/admin/users", "/admin/users", true)]
#[case("/admin/users", "/admin/users/7", true)]
#[case("/admin/users", "/admin/users-archive", false)]
#[case("/admin/dashboard", "/admin", false)]
fn active_link_matches_path_or_children(
    #[case] href: &str,
    #[case] path: &str,
    #[case] expected: bool,
) {
    assert_eq!(is_active(href, path), expected);
}

fn render(shell: &Shell) -> String {
    Templates::new()
        .expect("templates")
        .render_shell(shell)
        .expect("render")
}

#[test]
fn user_text_is_escaped_by_the_template() {
    let shell = Shell::new(
        "/admin/dashboard",
        Some(r#"<b>"Tom" & 'Jerry'</b>"#.to_string()),
        true,
    );
    let html = render(&shell);

    assert!(html.contains("&lt;b&gt;&quot;Tom&quot; &amp;"));
    assert!(!html.contains("<b>"));
    assert!(!html.contains(r#""Tom""#));
}

#[test]
fn shell_falls_back_to_loading_and_narrows_when_collapsed() {
    let shell = Shell::new("/employee/request-leave", None, false);
    assert_eq!(shell.display_name(), "Loading...");

    let html = render(&shell);
    assert!(html.contains("Loading..."));
    assert!(html.contains("w-20"));
    assert!(!html.contains("w-64"));
    assert!(html.contains("?sidebar=open"));
    assert!(html.contains("<h2>Request Leave</h2>"));
    assert!(html.contains(r#"href="/employee/request-leave""#));
    assert!(!html.contains("Manage Employees"));
}

#[test]
fn open_admin_shell_lists_admin_links() {
    let shell = Shell::new("/admin/dashboard", Some("Boss".to_string()), true);
    let html = render(&shell);

    assert!(html.contains("w-64"));
    assert!(html.contains("Admin Dashboard"));
    assert!(html.contains("Manage Employees"));
    assert!(html.contains(r#"data-icon="users""#));
    assert!(html.contains(r#"href="/signout""#));
    assert!(html.contains("Hi, <span class=\"font-semibold\">Boss</span>"));
}

#[test]
fn sign_in_page_posts_to_login() {
    let html = Templates::new()
        .expect("templates")
        .render_sign_in()
        .expect("render");

    assert!(html.contains(r#"fetch("/user/login""#));
    assert!(html.contains(r#""/admin/dashboard""#));
}

#[actix_web::test]
async fn pages_redirect_to_sign_in_without_a_token() {
    let state = test_state();
    let app = test_app(&state).await;

    let req = TestRequest::get().uri("/employee/dashboard").to_request();
    let resp = call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), SIGN_IN_PATH);
}

#[actix_web::test]
async fn stale_session_cookie_is_cleared() {
    let state = test_state();
    let app = test_app(&state).await;

    // a refresh token is not a session
    let (refresh, _) =
        generate_refresh_token(1, "jane", Role::Employee, &state.config.jwt_secret, 60)
            .expect("token");
    let req = TestRequest::get()
        .uri("/employee/dashboard")
        .cookie(Cookie::new("auth-token", refresh))
        .to_request();
    let resp = call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), SIGN_IN_PATH);
    let cleared = resp
        .response()
        .cookies()
        .find(|c| c.name() == "auth-token")
        .expect("removal cookie");
    assert_eq!(cleared.value(), "");
}

#[actix_web::test]
async fn employee_page_greets_the_signed_in_user() {
    let state = test_state();
    let app = test_app(&state).await;
    let (_, token) = register(&app, "jane", 8801700000001, false).await;

    let req = TestRequest::get()
        .uri("/employee/request-leave?sidebar=collapsed")
        .cookie(Cookie::new("auth-token", token))
        .to_request();
    let resp = call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let html = String::from_utf8_lossy(&read_body(resp).await).into_owned();
    assert!(html.contains("jane Tester"));
    assert!(html.contains("Employee Dashboard"));
    assert!(html.contains("w-20"));
    assert!(html.contains(r#"href="/signout""#));
}

#[actix_web::test]
async fn employees_are_sent_away_from_admin_pages() {
    let state = test_state();
    let app = test_app(&state).await;
    let (_, token) = register(&app, "jane", 8801700000001, false).await;

    let req = TestRequest::get()
        .uri("/admin/users")
        .insert_header(("auth-token", token))
        .to_request();
    let resp = call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/employee/dashboard"
    );
}

#[actix_web::test]
async fn admins_get_the_admin_shell() {
    let state = test_state();
    let app = test_app(&state).await;
    let (_, token) = register(&app, "boss", 8801700000009, true).await;

    let req = TestRequest::get()
        .uri("/admin/users")
        .insert_header(("auth-token", token))
        .to_request();
    let resp = call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let html = String::from_utf8_lossy(&read_body(resp).await).into_owned();
    assert!(html.contains("Manage Employees"));
    assert!(html.contains("<h2>Manage Employees</h2>"));
}

#[actix_web::test]
async fn sign_out_clears_the_session() {
    let state = test_state();
    let app = test_app(&state).await;

    let req = TestRequest::get().uri(SIGN_OUT_PATH).to_request();
    let resp = call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), SIGN_IN_PATH);
    assert!(resp.response().cookies().any(|c| c.name() == "auth-token"));

    let req = TestRequest::get().uri(SIGN_IN_PATH).to_request();
    assert_eq!(call_service(&app, req).await.status(), StatusCode::OK);
}
