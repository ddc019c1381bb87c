use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.github.com".to_string()
}

/// A repository to surface on the projects panel.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRef {
    pub owner: String,
    pub repo: String,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityService;

impl ActivityService {
    pub fn name(&self) -> &'static str {
        "activity"
    }

    pub fn status(&self) -> &'static str {
        "ready"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoSummary {
    pub full_name: String,
    pub html_url: String,
    pub stargazers_count: u64,
}

pub async fn fetch_repo(
    client: &reqwest::Client,
    config: &ActivityConfig,
    project: &ProjectRef,
) -> Result<RepoSummary, ActivityError> {
    let url = format!(
        "{}/repos/{}/{}",
        config.base_url.trim_end_matches('/'),
        project.owner,
        project.repo
    );
    let response = client
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
        .header(reqwest::header::USER_AGENT, "homefeed")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ActivityError::HttpStatus(status.as_u16()));
    }

    Ok(response.json::<RepoSummary>().await?)
}

/// Fetch each listed project and render the ones that resolve. Repositories
/// that fail to load are skipped with a warning rather than sinking the whole
/// panel.
pub async fn render_projects_fragment(
    client: &reqwest::Client,
    config: &ActivityConfig,
    projects: &[ProjectRef],
) -> String {
    let mut cards = String::new();
    for project in projects {
        match fetch_repo(client, config, project).await {
            Ok(summary) => cards.push_str(&project_card(&summary)),
            Err(error) => {
                warn!(
                    owner = %project.owner,
                    repo = %project.repo,
                    %error,
                    "skipping project card"
                );
            }
        }
    }
    format!("<div class='project-list'>{cards}</div>")
}

fn project_card(summary: &RepoSummary) -> String {
    format!(
        "<div class='project'><a href=\"{url}\">{name}</a><span class='stars'>&#9733; {stars}</span></div>",
        url = summary.html_url,
        name = summary.full_name,
        stars = summary.stargazers_count,
    )
}
