// src/services/portal.rs

//! WebSinu portal client.
//!
//! Logs in, follows the portal's JavaScript redirect, opens the grade view of
//! the current session and parses the grade table.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Credentials, GradeRow, GradeSnapshot, PortalConfig, snapshot_from_rows};
use crate::services::GradeSource;
use crate::utils::{element_text, first_attr, http, page_title, selector};

/// Title of the page reached after a successful login.
const GRADES_PAGE_TITLE: &str = "Note din sesiunea curenta";

const LOGIN_PAGE: &str = "default.asp";
const ROLES_PAGE: &str = "roluri.asp";

const SESSION_FORM: &str = r#"form[name="frmData"][action="roluri.asp"]"#;

/// Columns of a grade table row: year, semester, subject, type, date, grade.
const GRADE_COLUMNS: usize = 6;

/// Session state after login.
#[derive(Debug, Clone)]
struct Landing {
    sid: String,
    html: String,
}

/// Fields of the hidden `frmData` form.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionForm {
    sid: Option<String>,
    self_submit: Option<String>,
}

/// Client for the WebSinu grade portal.
#[derive(Debug, Clone)]
pub struct PortalClient {
    config: PortalConfig,
    login_url: Url,
    roles_url: Url,
}

impl PortalClient {
    /// Create a new portal client. Fails if the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: PortalConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        let login_url = base.join(LOGIN_PAGE)?;
        let roles_url = base.join(ROLES_PAGE)?;
        // Startup check only. Every fetch builds its own client so one
        // user's cookies never reach the next login.
        http::create_session_client(&config)?;

        Ok(Self {
            config,
            login_url,
            roles_url,
        })
    }

    /// POST a form and return the response body.
    async fn post_form(&self, client: &Client, url: &Url, fields: &[(&str, &str)]) -> Result<String> {
        let response = client
            .post(url.clone())
            .form(fields)
            .send()
            .await
            .map_err(|e| AppError::network(format!("POST {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::network(format!("POST {url}: status {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::network(format!("reading {url}: {e}")))
    }

    /// Log in and land on the grade selection page.
    async fn login(&self, client: &Client, credentials: &Credentials) -> Result<Landing> {
        log::debug!("Sending login request for '{}'", credentials.username);
        let html = self
            .post_form(
                client,
                &self.login_url,
                &[
                    ("hidSelfSubmit", LOGIN_PAGE),
                    ("username", credentials.username.as_str()),
                    ("password", credentials.password.as_str()),
                    ("submit", " Intra "),
                ],
            )
            .await?;

        if is_redirect_page(&html) {
            log::debug!("Detected JavaScript redirect page, following");
            let form = parse_session_form(&html)?.ok_or_else(|| {
                AppError::authentication("redirect page has no session form")
            })?;
            let sid = form
                .sid
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::authentication("redirect page has no session id"))?;
            let self_submit = form.self_submit.unwrap_or_else(|| ROLES_PAGE.to_string());

            let html = self
                .post_form(
                    client,
                    &self.roles_url,
                    &[
                        ("hidSelfSubmit", self_submit.as_str()),
                        ("sid", sid.as_str()),
                        ("hidOperation", ""),
                        ("hidNume_Facultate", ""),
                        ("hidNume_Specializare", ""),
                    ],
                )
                .await?;

            if !has_grades_title(&html) {
                return Err(AppError::authentication(format!(
                    "login completed but '{GRADES_PAGE_TITLE}' page was not reached"
                )));
            }
            return Ok(Landing { sid, html });
        }

        if has_grades_title(&html) {
            log::debug!("Landed on grade page directly");
            let sid = parse_session_form(&html)?
                .and_then(|form| form.sid)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::authentication("grade page has no session id"))?;
            return Ok(Landing { sid, html });
        }

        Err(AppError::authentication("portal rejected the login"))
    }

    /// Open the current-session grade view and parse its rows.
    async fn fetch_rows(&self, client: &Client, landing: &Landing) -> Result<Vec<GradeRow>> {
        let (faculty, specialization) = parse_program(&landing.html)?;
        log::debug!("Found faculty '{faculty}', specialization '{specialization}'");

        let html = self
            .post_form(
                client,
                &self.roles_url,
                &[
                    ("hidSelfSubmit", ROLES_PAGE),
                    ("sid", landing.sid.as_str()),
                    ("hidOperation", "N"),
                    ("hidNume_Facultate", faculty.as_str()),
                    ("hidNume_Specializare", specialization.as_str()),
                ],
            )
            .await?;

        parse_grade_rows(&html)
    }
}

#[async_trait]
impl GradeSource for PortalClient {
    async fn fetch_grades(&self, credentials: &Credentials) -> Result<GradeSnapshot> {
        let client = http::create_session_client(&self.config)?;
        let landing = self.login(&client, credentials).await?;
        let rows = self.fetch_rows(&client, &landing).await?;

        if rows.is_empty() {
            return Err(AppError::parse("no grade rows found on the grade page"));
        }
        log::debug!("Parsed {} grade rows", rows.len());
        Ok(snapshot_from_rows(&rows))
    }
}

/// The portal answers a login with a page that submits `frmData` from script.
fn is_redirect_page(html: &str) -> bool {
    html.contains("document.frmData.submit()") && html.contains(ROLES_PAGE)
}

fn has_grades_title(html: &str) -> bool {
    page_title(&Html::parse_document(html)).as_deref() == Some(GRADES_PAGE_TITLE)
}

/// Read the hidden session form, if the page has one.
fn parse_session_form(html: &str) -> Result<Option<SessionForm>> {
    let document = Html::parse_document(html);
    let form_sel = selector(SESSION_FORM)?;
    if document.select(&form_sel).next().is_none() {
        return Ok(None);
    }

    Ok(Some(SessionForm {
        sid: first_attr(&document, &format!(r#"{SESSION_FORM} input[name="sid"]"#), "value")?,
        self_submit: first_attr(
            &document,
            &format!(r#"{SESSION_FORM} input[name="hidSelfSubmit"]"#),
            "value",
        )?,
    }))
}

fn program_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"NoteSesiuneaCurenta\('(.*?)',\s*'(.*?)'\)").expect("valid regex")
    })
}

/// Faculty and specialization from the "view grades" link.
fn parse_program(html: &str) -> Result<(String, String)> {
    let document = Html::parse_document(html);
    let href = first_attr(
        &document,
        r#"a[href^="javascript: NoteSesiuneaCurenta"]"#,
        "href",
    )?
    .ok_or_else(|| AppError::parse("grade view link (NoteSesiuneaCurenta) not found"))?;

    let caps = program_pattern()
        .captures(&href)
        .ok_or_else(|| AppError::parse(format!("cannot read program from link '{href}'")))?;

    Ok((caps[1].trim().to_string(), caps[2].trim().to_string()))
}

/// Rows with exactly six cells inside a `table.table`.
fn parse_grade_rows(html: &str) -> Result<Vec<GradeRow>> {
    let document = Html::parse_document(html);
    let row_sel = selector("tr")?;

    let rows = document
        .select(&row_sel)
        .filter(|tr| in_grade_table(tr))
        .filter_map(|tr| {
            let cells: Vec<String> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| cell.value().name() == "td")
                .map(|cell| element_text(&cell))
                .collect();

            let [year, semester, subject, kind, date, grade]: [String; GRADE_COLUMNS] =
                cells.try_into().ok()?;
            Some(GradeRow {
                year,
                semester,
                subject,
                kind,
                date,
                grade,
            })
        })
        .collect();

    Ok(rows)
}

/// Whether the closest enclosing table has class `table`.
fn in_grade_table(tr: &ElementRef<'_>) -> bool {
    tr.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
        .is_some_and(|table| table.value().classes().any(|c| c == "table"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REDIRECT_PAGE: &str = r#"
        <html><body onload="document.frmData.submit()">
        <form name="frmData" action="roluri.asp" method="post">
            <input type="hidden" name="sid" value="S3SS10N">
            <input type="hidden" name="hidSelfSubmit" value="roluri.asp">
        </form>
        </body></html>"#;

    const LANDING_PAGE: &str = r#"
        <html><head><title>Note din sesiunea curenta</title></head><body>
        <form name="frmData" action="roluri.asp" method="post">
            <input type="hidden" name="sid" value="S3SS10N">
        </form>
        <a href="javascript: NoteSesiuneaCurenta('Automatica si Calculatoare', 'Calculatoare')">Vizualizare note</a>
        </body></html>"#;

    const GRADES_PAGE: &str = r#"
        <html><head><title>Note din sesiunea curenta</title></head><body>
        <table class="table">
            <tr><th>An</th><th>Sem</th><th>Disciplina</th><th>Tip</th><th>Data</th><th>Nota</th></tr>
            <tr><td>2</td><td>1</td><td>Baze&nbsp;de date</td><td>E</td><td>20.01.2025</td><td>9</td></tr>
            <tr><td>2</td><td>1</td><td>Fizica</td><td>E</td><td>22.01.2025</td><td>Necules</td></tr>
            <tr><td>2</td><td>1</td><td>incomplete row</td></tr>
        </table>
        <table class="legend">
            <tr><td>1</td><td>2</td><td>3</td><td>4</td><td>5</td><td>6</td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn test_detects_redirect_page() {
        assert!(is_redirect_page(REDIRECT_PAGE));
        assert!(!is_redirect_page(LANDING_PAGE));
    }

    #[test]
    fn test_parse_session_form() {
        let form = parse_session_form(REDIRECT_PAGE).unwrap().unwrap();
        assert_eq!(form.sid.as_deref(), Some("S3SS10N"));
        assert_eq!(form.self_submit.as_deref(), Some("roluri.asp"));

        assert_eq!(parse_session_form("<html></html>").unwrap(), None);
    }

    #[test]
    fn test_grades_title() {
        assert!(has_grades_title(LANDING_PAGE));
        assert!(!has_grades_title(REDIRECT_PAGE));
    }

    #[test]
    fn test_parse_program() {
        let (faculty, specialization) = parse_program(LANDING_PAGE).unwrap();
        assert_eq!(faculty, "Automatica si Calculatoare");
        assert_eq!(specialization, "Calculatoare");
    }

    #[test]
    fn test_parse_program_missing_link() {
        assert!(matches!(
            parse_program(REDIRECT_PAGE),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_grade_rows() {
        let rows = parse_grade_rows(GRADES_PAGE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].subject, "Baze de date");
        assert_eq!(rows[0].grade, "9");
        assert_eq!(rows[1].grade, "Necules");

        let snapshot = snapshot_from_rows(&rows);
        assert_eq!(snapshot["Baze de date (Y2/S1)"], "9");
        assert_eq!(snapshot["Fizica (Y2/S1)"], "Necules");
    }

    #[test]
    fn test_parse_grade_rows_empty_page() {
        assert!(parse_grade_rows(LANDING_PAGE).unwrap().is_empty());
    }

    #[test]
    fn test_client_rejects_unusable_user_agent() {
        let config = PortalConfig {
            user_agent: "gradewatch\n0.1".into(),
            ..PortalConfig::default()
        };
        assert!(matches!(PortalClient::new(config), Err(AppError::Http(_))));
    }

    #[test]
    fn test_client_builds_endpoints() {
        let client = PortalClient::new(PortalConfig::default()).unwrap();
        assert_eq!(
            client.login_url.as_str(),
            "https://websinu.utcluj.ro/note/default.asp"
        );
        assert_eq!(
            client.roles_url.as_str(),
            "https://websinu.utcluj.ro/note/roluri.asp"
        );
    }
}
