use shared::{DiseaseLabel, Prediction};

use crate::dashboard::DashboardStats;
use crate::flash::FlashMessage;
use crate::storage::upload_store::public_url;

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn flash_list(messages: &[FlashMessage]) -> String {
    messages
        .iter()
        .map(|flash| {
            format!(
                r#"<div class="alert alert-{}" role="alert">{}</div>"#,
                flash.level.as_str(),
                escape(&flash.message)
            )
        })
        .collect()
}

/// Shared page shell. `body` must already be escaped.
pub fn layout(title: &str, messages: &[FlashMessage], body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title} | MaiScan</title>
  <link rel="stylesheet" href="/static/css/style.css">
</head>
<body>
  <nav class="navbar">
    <a class="brand" href="/">MaiScan</a>
    <a href="/maiscan">Scan</a>
    <a href="/login">Log in</a>
    <a href="/register">Register</a>
    <a href="/logout">Log out</a>
  </nav>
  <main class="container">
    {flashes}
    {body}
  </main>
</body>
</html>
"#,
        title = escape(title),
        flashes = flash_list(messages),
        body = body,
    )
}

pub fn home(messages: &[FlashMessage]) -> String {
    layout(
        "Home",
        messages,
        r#"<section class="hero">
      <h1>MaiScan</h1>
      <p>Upload a photo of a corn leaf and get an instant disease diagnosis.</p>
      <a class="btn" href="/maiscan">Start scanning</a>
    </section>"#,
    )
}

fn credentials_form(action: &str, submit: &str) -> String {
    format!(
        r#"<form method="post" action="{action}" class="auth-form">
      <label for="email">Email</label>
      <input type="email" id="email" name="email" required>
      <label for="password">Password</label>
      <input type="password" id="password" name="password" required>
      <button type="submit" class="btn">{submit}</button>
    </form>"#
    )
}

pub fn register(messages: &[FlashMessage]) -> String {
    let body = format!(
        r#"<h1>Create an account</h1>
    {}
    <p>Already registered? <a href="/login">Log in</a></p>"#,
        credentials_form("/register", "Register")
    );
    layout("Register", messages, &body)
}

pub fn login(messages: &[FlashMessage]) -> String {
    let body = format!(
        r#"<h1>Log in</h1>
    {}
    <p>No account yet? <a href="/register">Register</a></p>"#,
        credentials_form("/login", "Log in")
    );
    layout("Log in", messages, &body)
}

pub fn dashboard(email: &str, stats: &DashboardStats, messages: &[FlashMessage]) -> String {
    let counts: String = stats
        .disease_counts
        .iter()
        .map(|(label, count)| format!("<li>{}: {}</li>", escape(label), count))
        .collect();

    let history: String = stats
        .uploads
        .iter()
        .map(|upload| {
            format!(
                r#"<tr><td><img src="{}" alt="upload" class="thumb"></td><td>{}</td><td>{:.1}%</td><td>{}</td></tr>"#,
                escape(&public_url(&upload.filename)),
                escape(&upload.disease_type),
                upload.confidence * 100.0,
                upload.upload_date.format("%Y-%m-%d %H:%M")
            )
        })
        .collect();

    let body = format!(
        r#"<h1>Welcome, {email}</h1>
    <form method="post" action="/predict" enctype="multipart/form-data" class="upload-form">
      <input type="file" name="image" accept=".png,.jpg,.jpeg" required>
      <button type="submit" class="btn">Analyze</button>
    </form>
    <section class="stats">
      <div class="stat"><span>Total images</span><strong>{total}</strong></div>
      <div class="stat"><span>Diseased</span><strong>{diseased}</strong></div>
      <div class="stat"><span>Most common disease</span><strong>{most_common}</strong></div>
      <div class="stat"><span>Labels seen</span><strong>{types}</strong></div>
    </section>
    <ul class="disease-counts">{counts}</ul>
    <table class="history">
      <thead><tr><th>Image</th><th>Result</th><th>Confidence</th><th>Date</th></tr></thead>
      <tbody>{history}</tbody>
    </table>"#,
        email = escape(email),
        total = stats.total_images,
        diseased = stats.disease_count,
        most_common = escape(&stats.most_common_disease),
        types = stats.disease_types.len(),
        counts = counts,
        history = history,
    );
    layout("Dashboard", messages, &body)
}

/// Short description and management advice shown on a label's result page.
pub fn guidance(label: DiseaseLabel) -> (&'static str, &'static str) {
    match label {
        DiseaseLabel::Aphids => (
            "Small sap-sucking insects clustered on leaves and tassels, often leaving sticky honeydew.",
            "Encourage natural predators such as lady beetles. Treat only heavy infestations around tasseling.",
        ),
        DiseaseLabel::Armyworm => (
            "Caterpillars that chew ragged holes in leaves and can strip young plants quickly.",
            "Scout in the evening, and apply a labelled insecticide when larvae are small and damage exceeds thresholds.",
        ),
        DiseaseLabel::CommonCutworm => (
            "Larvae that cut seedlings at or just below the soil surface.",
            "Control weeds before planting and treat fields where more than a few percent of seedlings are cut.",
        ),
        DiseaseLabel::CommonRust => (
            "Fungal disease forming cinnamon-brown pustules on both leaf surfaces.",
            "Plant resistant hybrids. Consider a fungicide if pustules appear on upper leaves before silking.",
        ),
        DiseaseLabel::CommonSmut => (
            "Fungal galls that swell on ears, tassels and stalks, later bursting into black spores.",
            "Remove galls before they rupture, avoid mechanical injury and rotate away from infected fields.",
        ),
        DiseaseLabel::CornBorer => (
            "Larvae tunnel into stalks and ears, leaving shot holes and frass.",
            "Use Bt hybrids where available and shred stalks after harvest to reduce overwintering larvae.",
        ),
        DiseaseLabel::Earwig => (
            "Night-feeding insects that chew leaves and silks.",
            "Remove debris where they shelter and use traps. Treat only when silk feeding threatens pollination.",
        ),
        DiseaseLabel::FusariumEarRot => (
            "Fungal rot producing white to pink mould on scattered kernels, which may contain mycotoxins.",
            "Harvest promptly, dry grain below 15% moisture and test suspect grain before feeding.",
        ),
        DiseaseLabel::GrayLeafSpot => (
            "Fungal disease with long, rectangular grey lesions bounded by leaf veins.",
            "Rotate crops, till residue and use tolerant hybrids. Apply fungicide when lesions reach the ear leaf.",
        ),
        DiseaseLabel::HealthyCorn => (
            "No signs of disease or pest damage were detected on this plant.",
            "Keep up regular scouting, balanced fertilization and good field hygiene.",
        ),
        DiseaseLabel::HealthyLeaf => (
            "The leaf shows no visible symptoms of disease or pest damage.",
            "Continue routine monitoring, especially during warm, humid weather.",
        ),
        DiseaseLabel::LeafBlight => (
            "Fungal disease causing long, cigar-shaped grey-green to tan lesions.",
            "Use resistant hybrids, rotate crops and apply fungicide if lesions spread before tasseling.",
        ),
        DiseaseLabel::Leafhopper => (
            "Wedge-shaped insects that feed on sap and can transmit corn stunt.",
            "Plant early, control volunteer corn and monitor populations on young plants.",
        ),
    }
}

pub fn result(label: DiseaseLabel, filename: &str, confidence: f32) -> String {
    let (description, advice) = guidance(label);
    let status_class = if label.is_healthy() { "healthy" } else { "diseased" };
    let body = format!(
        r#"<article class="result result-{slug} {status_class}">
      <h1>{name}</h1>
      <img src="{image}" alt="Uploaded leaf" class="result-image">
      <p class="confidence">Confidence: {confidence:.2}%</p>
      <h2>About</h2>
      <p>{description}</p>
      <h2>What to do</h2>
      <p>{advice}</p>
      <a class="btn" href="/maiscan">Scan another image</a>
    </article>"#,
        slug = label.view_slug(),
        status_class = status_class,
        name = escape(label.as_ref()),
        image = escape(&public_url(filename)),
        confidence = confidence * 100.0,
        description = description,
        advice = advice,
    );
    layout(label.as_ref(), &[], &body)
}

pub fn invalid_image(prediction: &Prediction, filename: &str, confidence: f32) -> String {
    let reason = match prediction {
        Prediction::Error => "The image could not be analyzed.".to_string(),
        _ => format!(
            "The image does not look like a corn leaf we can diagnose (confidence {:.2}%).",
            confidence * 100.0
        ),
    };
    let body = format!(
        r#"<article class="result result-invalid">
      <h1>Invalid image</h1>
      <img src="{image}" alt="Uploaded image" class="result-image">
      <p>{reason}</p>
      <p>Please upload a clear, close-up photo of a single corn leaf.</p>
      <a class="btn" href="/maiscan">Try again</a>
    </article>"#,
        image = escape(&public_url(filename)),
        reason = reason,
    );
    layout("Invalid image", &[], &body)
}

pub fn not_found() -> String {
    layout(
        "Page not found",
        &[],
        r#"<h1>404</h1>
    <p>The page you requested does not exist.</p>
    <a class="btn" href="/">Back to home</a>"#,
    )
}

pub fn internal_error() -> String {
    layout(
        "Server error",
        &[],
        r#"<h1>500</h1>
    <p>Something went wrong on our side. Please try again.</p>
    <a class="btn" href="/">Back to home</a>"#,
    )
}
