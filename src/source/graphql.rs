//! GraphQL token feed client.
//!
//! Queries the launchpad's token listing ordered NEWEST with cursor
//! pagination. Items whose payload fails to parse are skipped without
//! being recorded anywhere, so they surface again on the next scan if
//! the upstream fixes itself.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::config::{HttpConfig, SourceConfig};
use crate::error::{AppError, Result};
use crate::models::{Item, Payload};
use crate::source::{ItemSource, Page};

/// Token listing query, newest-first with cursor pagination.
const TOKENS_QUERY: &str = r#"
query GetTokens($orderBy: TokenOrderBy!, $after: String, $first: Int, $filter: TokensFilter) {
  tokens(orderBy: $orderBy, after: $after, first: $first, filter: $filter) {
    edges {
      cursor
      node {
        id
        name
        symbol
        address
        description
        createdAt
        creator {
          twitterUsername
        }
      }
    }
    pageInfo {
      hasNextPage
      endCursor
    }
  }
}
"#;

/// GraphQL client for the token feed.
pub struct GraphqlSource {
    endpoint: String,
    page_size: usize,
    client: reqwest::Client,
}

impl GraphqlSource {
    /// Create a client against the configured endpoint.
    pub fn new(source: &SourceConfig, http: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&http.user_agent)
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: source.endpoint.clone(),
            page_size: source.page_size,
            client,
        })
    }

    fn build_variables(&self, after_cursor: Option<&str>) -> serde_json::Value {
        let mut variables = json!({
            "orderBy": "NEWEST",
            "first": self.page_size,
            "filter": { "includeNsfw": false },
        });
        if let Some(cursor) = after_cursor {
            variables["after"] = json!(cursor);
        }
        variables
    }

    /// Convert a raw GraphQL response into a page of items.
    fn parse_response(response: GraphqlResponse) -> Result<Page> {
        if let Some(error) = response.errors.first() {
            return Err(AppError::source("tokens query", &error.message));
        }
        let data = response
            .data
            .ok_or_else(|| AppError::source("tokens query", "response carried no data"))?;

        let mut items = Vec::with_capacity(data.tokens.edges.len());
        for edge in data.tokens.edges {
            match Self::parse_node(edge.node) {
                Ok(item) => items.push(item),
                Err(e) => log::warn!("Skipping unparseable token: {e}"),
            }
        }

        Ok(Page {
            items,
            has_next: data.tokens.page_info.has_next_page,
            next_cursor: data.tokens.page_info.end_cursor,
        })
    }

    fn parse_node(node: TokenNode) -> Result<Item> {
        let created_at: DateTime<Utc> = node
            .created_at
            .parse::<DateTime<Utc>>()
            .map_err(|e| AppError::source(&node.id, format!("bad createdAt: {e}")))?;

        Ok(Item {
            id: node.id,
            created_at,
            subject: node.creator.and_then(|c| c.twitter_username),
            payload: Payload {
                name: node.name,
                symbol: node.symbol,
                address: node.address,
                description: node.description.unwrap_or_default(),
            },
        })
    }
}

#[async_trait]
impl ItemSource for GraphqlSource {
    async fn fetch_page(&self, after_cursor: Option<&str>) -> Result<Page> {
        let body = json!({
            "query": TOKENS_QUERY,
            "variables": self.build_variables(after_cursor),
        });

        let response: GraphqlResponse = self
            .client
            .post(&self.endpoint)
            .header("accept", "application/graphql-response+json, application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Self::parse_response(response)
    }
}

// --- Wire format ---

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<TokensData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TokensData {
    tokens: TokenConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenConnection {
    edges: Vec<TokenEdge>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct TokenEdge {
    node: TokenNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenNode {
    id: String,
    name: String,
    symbol: String,
    address: String,
    description: Option<String>,
    created_at: String,
    creator: Option<Creator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Creator {
    twitter_username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}
