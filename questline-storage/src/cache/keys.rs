//! Key and tag builders for the leaderboard cache namespace.
//!
//! Keys follow `<subject>:<id-or-view>:<dimension>...`:
//!
//! - `leaderboard:<view>:<domain|all>:<limit>:<offset>`
//! - `user-rank:<entity>:<view>:<domain|all>`
//! - `user-neighborhood:<entity>:<view>:<domain|all>:<context>`
//! - `widget:<name>:<limit>`
//!
//! Tags are `leaderboard:<view>`, `domain:<domain>` and `user:<entity>`.
//! The store itself treats keys and tags as opaque strings.

use questline_core::{domain_label, EntityId, RankView};

pub const LEADERBOARD: &str = "leaderboard";
pub const USER_RANK: &str = "user-rank";
pub const USER_NEIGHBORHOOD: &str = "user-neighborhood";
pub const WIDGET: &str = "widget";

pub fn leaderboard(view: RankView, domain: Option<&str>, limit: u32, offset: u64) -> String {
    format!(
        "{LEADERBOARD}:{}:{}:{limit}:{offset}",
        view.as_str(),
        domain_label(domain)
    )
}

pub fn user_rank(entity: EntityId, view: RankView, domain: Option<&str>) -> String {
    format!(
        "{USER_RANK}:{entity}:{}:{}",
        view.as_str(),
        domain_label(domain)
    )
}

pub fn user_neighborhood(
    entity: EntityId,
    view: RankView,
    domain: Option<&str>,
    context: u32,
) -> String {
    format!(
        "{USER_NEIGHBORHOOD}:{entity}:{}:{}:{context}",
        view.as_str(),
        domain_label(domain)
    )
}

pub fn widget(name: &str, limit: u32) -> String {
    format!("{WIDGET}:{name}:{limit}")
}

/// Prefix shared by every cached page of one view.
pub fn leaderboard_prefix(view: RankView) -> String {
    format!("{LEADERBOARD}:{}:", view.as_str())
}

pub fn view_tag(view: RankView) -> String {
    format!("{LEADERBOARD}:{}", view.as_str())
}

pub fn domain_tag(domain: &str) -> String {
    format!("domain:{domain}")
}

pub fn user_tag(entity: EntityId) -> String {
    format!("user:{entity}")
}
