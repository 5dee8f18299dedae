#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use backend::db::UserRepository;
use backend::flash::FlashMessage;
use common::*;
use shared::DiseaseLabel;

const EMAIL: &str = "grower@example.com";
const PASSWORD: &str = "correct-horse";

fn flash_value(message: FlashMessage) -> Option<String> {
    Some(message.to_cookie().value().to_string())
}

fn credentials(uri: &str, email: &str, password: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .set_form([("email", email), ("password", password)])
}

#[actix_web::test]
async fn register_login_logout_round() {
    let harness = Harness::confident(DiseaseLabel::Aphids, 0.9);
    let app = init_app!(harness);

    let resp = test::call_service(&app, credentials("/register", EMAIL, PASSWORD).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login");
    assert_eq!(
        flash_cookie(&resp),
        flash_value(FlashMessage::success("Registration successful! Please log in."))
    );
    assert_eq!(harness.repo.user_count(), 1);

    let resp = test::call_service(&app, credentials("/login", EMAIL, PASSWORD).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/maiscan");
    let session = session_cookie(&resp).expect("session cookie issued");
    assert!(session.http_only().unwrap_or(false));

    let user = harness
        .repo
        .get_user_by_cognito_sub(&harness.identity.subject_for(EMAIL).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(user.last_login.is_some());
    assert!(user.cognito_access_token.is_some());

    let req = test::TestRequest::get()
        .uri("/maiscan")
        .cookie(session.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains(EMAIL));

    let req = test::TestRequest::get()
        .uri("/logout")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/");
    assert_eq!(
        flash_cookie(&resp),
        flash_value(FlashMessage::success("You have been logged out."))
    );
    assert_eq!(session_cookie(&resp).unwrap().value(), "");
    assert_eq!(harness.identity.sign_out_count(), 1);

    let user = harness.repo.get_user(user.id).await.unwrap();
    assert!(user.cognito_access_token.is_none());
    assert!(user.cognito_refresh_token.is_none());
}

#[actix_web::test]
async fn wrong_password_is_rejected_generically() {
    let harness = Harness::confident(DiseaseLabel::Aphids, 0.9);
    let app = init_app!(harness);
    test::call_service(&app, credentials("/register", EMAIL, PASSWORD).to_request()).await;

    for (email, password) in [(EMAIL, "wrong-password"), ("nobody@example.com", PASSWORD)] {
        let resp =
            test::call_service(&app, credentials("/login", email, password).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(session_cookie(&resp).is_none());
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("Invalid email or password."));
    }
}

#[actix_web::test]
async fn empty_fields_are_required() {
    let harness = Harness::confident(DiseaseLabel::Aphids, 0.9);
    let app = init_app!(harness);

    for uri in ["/register", "/login"] {
        let resp = test::call_service(&app, credentials(uri, "   ", PASSWORD).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("Email and password are required."));
    }
    assert_eq!(harness.repo.user_count(), 0);
}

#[actix_web::test]
async fn duplicate_registration_does_not_reveal_account() {
    let harness = Harness::confident(DiseaseLabel::Aphids, 0.9);
    let app = init_app!(harness);
    test::call_service(&app, credentials("/register", EMAIL, PASSWORD).to_request()).await;

    let resp = test::call_service(&app, credentials("/register", EMAIL, PASSWORD).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("Registration failed. Please check your details and try again."));
    assert!(!body.contains("exists"));
    assert_eq!(harness.repo.user_count(), 1);
}

#[actix_web::test]
async fn weak_password_gets_its_own_message() {
    let harness = Harness::confident(DiseaseLabel::Aphids, 0.9);
    let app = init_app!(harness);

    let resp = test::call_service(&app, credentials("/register", EMAIL, "short").to_request()).await;
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("the password does not meet the requirements"));
    assert_eq!(harness.repo.user_count(), 0);
}

#[actix_web::test]
async fn login_creates_missing_user_row() {
    let harness = Harness::confident(DiseaseLabel::Aphids, 0.9);
    // Account known to the provider only.
    use backend::auth::IdentityProvider;
    harness.identity.register(EMAIL, PASSWORD).await.unwrap();
    let app = init_app!(harness);

    let resp = test::call_service(&app, credentials("/login", EMAIL, PASSWORD).to_request()).await;
    assert_eq!(location(&resp), "/maiscan");
    assert_eq!(harness.repo.user_count(), 1);
}

#[actix_web::test]
async fn flash_is_shown_once() {
    let harness = Harness::confident(DiseaseLabel::Aphids, 0.9);
    let app = init_app!(harness);

    let flash = FlashMessage::info("Please log in to access this page.");
    let req = test::TestRequest::get()
        .uri("/login")
        .cookie(flash.to_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(flash_cookie(&resp).as_deref(), Some(""));
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("Please log in to access this page."));
}
