use async_trait::async_trait;
use futures::TryStreamExt;
use gitsearch::api::{ApiCommit, Contributor, ForkRecord, GithubApi, RepoMetadata, RepoTarget, Result, UserProfile};
use log::debug;
use serde::de::DeserializeOwned;

mod builder;
mod credentials;
mod pager;
mod payload;

pub use builder::GithubClientBuilder;
pub use credentials::{CredentialError, CredentialRotator};
pub use pager::{Page, Pager};

pub struct GithubClient {
    pager: Pager,
    github_url: String,
    per_page: u32,
}

impl GithubClient {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.github_url, path)
    }

    fn list_url(&self, path: &str) -> String {
        format!("{}{}?per_page={}", self.github_url, path, self.per_page)
    }

    async fn one<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(self.pager.fetch::<T>(&self.url(path)).await?.payload)
    }

    /// Every page of a list endpoint. Fails as a whole when any page does.
    async fn all<T: DeserializeOwned + Send>(&self, path: &str) -> Result<Vec<T>> {
        let items: Vec<T> = self.pager.fetch_all_pages(self.list_url(path)).try_concat().await?;
        debug!("{} items from {}", items.len(), path);
        Ok(items)
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn repo(&self, target: &RepoTarget) -> Result<RepoMetadata> {
        let path = format!("/repos/{}/{}", target.owner, target.name);
        Ok(self.one::<payload::Repo>(&path).await?.into())
    }

    async fn forks(&self, target: &RepoTarget) -> Result<Vec<ForkRecord>> {
        let path = format!("/repos/{}/{}/forks", target.owner, target.name);
        let forks = self.all::<payload::Repo>(&path).await?;
        Ok(forks.into_iter().map(ForkRecord::from).collect())
    }

    async fn contributors(&self, target: &RepoTarget) -> Result<Vec<Contributor>> {
        let path = format!("/repos/{}/{}/contributors", target.owner, target.name);
        let contributors = self.all::<payload::Contributor>(&path).await?;
        Ok(contributors.into_iter().map(Contributor::from).collect())
    }

    async fn commits(&self, target: &RepoTarget) -> Result<Vec<ApiCommit>> {
        let path = format!("/repos/{}/{}/commits", target.owner, target.name);
        let commits = self.all::<payload::Commit>(&path).await?;
        Ok(commits.into_iter().map(ApiCommit::from).collect())
    }

    async fn user(&self, login: &str) -> Result<UserProfile> {
        let path = format!("/users/{}", login);
        Ok(self.one::<payload::User>(&path).await?.into())
    }

    async fn user_repos(&self, login: &str) -> Result<Vec<RepoTarget>> {
        let path = format!("/users/{}/repos", login);
        let repos = self.all::<payload::Repo>(&path).await?;
        Ok(repos.iter().map(RepoTarget::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::GithubClientBuilder;
    use gitsearch::api::{Error, GithubApi, RepoTarget};
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn octo_hello() -> RepoTarget {
        RepoTarget::new("octo".to_string(), "hello".to_string())
    }

    fn repo_body(owner: &str, name: &str) -> serde_json::Value {
        json!({
            "name": name,
            "owner": { "login": owner },
            "html_url": format!("https://github.com/{}/{}", owner, name),
            "description": null,
            "created_at": "2020-01-02T03:04:05Z",
            "updated_at": "2021-01-02T03:04:05Z",
            "pushed_at": "2022-01-02T03:04:05Z",
            "forks_count": 2,
            "stargazers_count": 10,
            "default_branch": "main"
        })
    }

    #[tokio::test]
    async fn forks_across_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/forks"))
            .and(query_param("per_page", "2"))
            .and(header("Accept", "application/vnd.github.v3+json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([repo_body("ann", "hello"), repo_body("bob", "hello")]))
                    .insert_header(
                        "link",
                        format!(r#"<{}/repositories/1/forks?per_page=2&page=2>; rel="next""#, server.uri()).as_str(),
                    ),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/1/forks"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_body("cid", "hello-fork")])))
            .expect(1)
            .mount(&server)
            .await;

        let client = GithubClientBuilder::default()
            .with_github_url(server.uri())
            .with_per_page(2)
            .build()
            .unwrap();
        let forks = client.forks(&octo_hello()).await.unwrap();

        let owners: Vec<&str> = forks.iter().map(|fork| fork.target.owner.as_str()).collect();
        assert_eq!(owners, vec!["ann", "bob", "cid"]);
        assert_eq!(forks[2].target.name, "hello-fork");
        assert_eq!(forks[0].url, "https://github.com/ann/hello");
        assert!(forks[0].pushed_at.is_some());
        assert_eq!(forks[0].branch_count, None);
    }

    #[tokio::test]
    async fn user_profile_and_commits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "login": "octo",
                "name": null,
                "email": null,
                "blog": "",
                "twitter_username": "octocat",
                "created_at": "2011-01-25T18:44:36Z"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/commits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
                "commit": {
                    "author": { "name": "Octo Cat", "email": "octo@work.com", "date": "2011-04-14T16:00:49Z" },
                    "committer": { "name": "GitHub", "email": "noreply@github.com", "date": "2011-04-14T16:00:49Z" }
                },
                "author": { "login": "octo" },
                "committer": null
            }])))
            .mount(&server)
            .await;

        let client = GithubClientBuilder::default().with_github_url(server.uri()).build().unwrap();
        let profile = client.user("octo").await.unwrap();
        assert_eq!(profile.name, None);
        assert_eq!(profile.website, None);
        assert_eq!(profile.twitter.as_deref(), Some("octocat"));

        let commits = client.commits(&octo_hello()).await.unwrap();
        assert_eq!(commits[0].author_login.as_deref(), Some("octo"));
        assert_eq!(commits[0].committer_login, None);
        assert_eq!(commits[0].author.email, "octo@work.com");
        assert_eq!(commits[0].committer.name, "GitHub");
    }

    #[tokio::test]
    async fn rate_limit_on_every_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(2)
            .mount(&server)
            .await;

        let client = GithubClientBuilder::default()
            .with_github_url(server.uri())
            .with_tokens(vec![SecretString::new("a".to_string()), SecretString::new("b".to_string())])
            .build()
            .unwrap();
        let result = client.contributors(&octo_hello()).await;
        assert!(matches!(result, Err(Error::RateLimited)));
    }

    #[tokio::test]
    async fn repo_metadata_and_user_repos() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_body("octo", "hello")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/octo/repos"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([repo_body("octo", "hello"), repo_body("octo", "dots")])),
            )
            .mount(&server)
            .await;

        let client = GithubClientBuilder::default().with_github_url(server.uri()).build().unwrap();
        let metadata = client.repo(&octo_hello()).await.unwrap();
        assert_eq!(metadata.target, octo_hello());
        assert_eq!(metadata.stargazers_count, 10);
        assert_eq!(metadata.default_branch.as_deref(), Some("main"));

        let repos = client.user_repos("octo").await.unwrap();
        assert_eq!(repos[1], RepoTarget::new("octo".to_string(), "dots".to_string()));
    }
}
