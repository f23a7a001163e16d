// src/core/leaderboard/speedrun.rs

//! [`Leaderboard`] backed by the speedrun.com v1 REST API.

use super::{Leaderboard, format_run_time};
use crate::config::LeaderboardConfig;
use crate::core::commands::place::Place;
use crate::core::{QueryFailure, RelayError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::debug;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct Board {
    runs: Vec<PlacedRun>,
}

#[derive(Deserialize)]
struct PlacedRun {
    place: u32,
    run: Run,
}

#[derive(Deserialize)]
struct Run {
    players: Vec<PlayerRef>,
    date: Option<String>,
    times: Times,
    #[serde(default)]
    values: HashMap<String, String>,
}

#[derive(Deserialize)]
struct PlayerRef {
    rel: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct Times {
    primary_t: f64,
}

#[derive(Deserialize)]
struct Player {
    names: Names,
    #[serde(default)]
    location: Option<Location>,
}

#[derive(Deserialize)]
struct Names {
    international: String,
}

#[derive(Deserialize)]
struct Location {
    #[serde(default)]
    country: Option<Named>,
    #[serde(default)]
    region: Option<Named>,
}

#[derive(Deserialize)]
struct Named {
    names: Names,
}

/// Everything the chat replies need to know about one run.
struct RunInfo {
    player: String,
    location: String,
    date: String,
    duration: String,
    place: Option<Place>,
}

pub struct SpeedrunCom {
    client: reqwest::Client,
    config: LeaderboardConfig,
}

impl SpeedrunCom {
    pub fn new(config: LeaderboardConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client for the leaderboard")?;
        Ok(Self { client, config })
    }

    fn board_uri(&self) -> String {
        format!(
            "{}/leaderboards/{}/category/{}?var-{}={}",
            self.config.api_base,
            self.config.game_id,
            self.config.category_id,
            self.config.variable_id,
            self.config.variable_value
        )
    }

    /// Fetches and decodes `uri`. With `allow_missing`, a 404 yields `None`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        uri: &str,
        allow_missing: bool,
    ) -> Result<Option<T>, RelayError> {
        debug!("GET {uri}");
        let unreachable = || {
            let site = url::Url::parse(uri)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| uri.to_string());
            RelayError::Query(QueryFailure(format!(
                "Failed to communicate with {site}, is it down?"
            )))
        };

        let response = self.client.get(uri).send().await.map_err(|_| unreachable())?;
        if allow_missing && response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(|_| unreachable())?;
        let body = response.bytes().await.map_err(|_| unreachable())?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn get_board(&self) -> Result<Board, RelayError> {
        let envelope: Envelope<Board> = self
            .get_json(&self.board_uri(), false)
            .await?
            .ok_or_else(|| RelayError::Unexpected("leaderboard response was empty".into()))?;
        Ok(envelope.data)
    }

    async fn run_info(&self, placed: &PlacedRun) -> Result<RunInfo, RelayError> {
        let player_ref = placed
            .run
            .players
            .first()
            .ok_or_else(|| RelayError::Unexpected("run has no players".into()))?;

        let (player, location) = match (&player_ref.rel[..], &player_ref.uri) {
            ("user", Some(uri)) => {
                let envelope: Envelope<Player> = self
                    .get_json(uri, false)
                    .await?
                    .ok_or_else(|| RelayError::Unexpected("player response was empty".into()))?;
                let player = envelope.data;
                let location = player
                    .location
                    .and_then(|l| l.region.or(l.country))
                    .map(|named| named.names.international)
                    .unwrap_or_else(|| "unknown location".to_string());
                (player.names.international, location)
            }
            _ => (
                player_ref.name.clone().unwrap_or_else(|| "a guest".to_string()),
                "unknown location".to_string(),
            ),
        };

        Ok(RunInfo {
            player,
            location,
            date: placed
                .run
                .date
                .clone()
                .unwrap_or_else(|| "an unknown date".to_string()),
            duration: format_run_time(placed.run.times.primary_t),
            place: Place::new(placed.place),
        })
    }

    fn is_tracked_category(&self, run: &Run) -> bool {
        run.values.get(&self.config.variable_id) == Some(&self.config.variable_value)
    }
}

fn place_text(place: Option<Place>) -> String {
    place.map_or_else(|| "an unranked".to_string(), |p| p.to_string())
}

#[async_trait]
impl Leaderboard for SpeedrunCom {
    async fn rank_lookup(&self, place: Place) -> Result<String, RelayError> {
        let board = self.get_board().await?;
        let Some(placed) = board.runs.get(place.index()) else {
            return Ok(format!("Sorry, there is nobody in {place} place."));
        };
        let info = self.run_info(placed).await?;

        let record = if place.rank() == 1 {
            "world record".to_string()
        } else {
            format!("{place} place record")
        };
        Ok(format!(
            "The {record} for {} is {} by {}, set on {}. {} is from {}.",
            self.config.category_name,
            info.duration,
            info.player,
            info.date,
            info.player,
            info.location
        ))
    }

    async fn user_lookup(&self, user: &str) -> Result<String, RelayError> {
        let uri = format!("{}/users/{user}/personal-bests", self.config.api_base);
        let Some(pbs) = self.get_json::<Envelope<Vec<PlacedRun>>>(&uri, true).await? else {
            return Ok(format!("User {user} does not exist on speedrun.com."));
        };

        let Some(pb) = pbs.data.iter().find(|pb| self.is_tracked_category(&pb.run)) else {
            return Ok(format!(
                "{user} has not submitted a {} time to the speedrun.com leaderboards.",
                self.config.category_short
            ));
        };
        let info = self.run_info(pb).await?;
        Ok(format!(
            "{user} has {} place in {}, with a time of {}. It was set on {}.",
            place_text(info.place),
            self.config.category_short,
            info.duration,
            info.date
        ))
    }

    async fn latest_run(&self) -> Result<String, RelayError> {
        let board = self.get_board().await?;

        let mut latest: Option<(NaiveDate, &PlacedRun)> = None;
        for placed in &board.runs {
            let Some(date) = &placed.run.date else {
                continue;
            };
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
            if latest.is_none_or(|(best, _)| date > best) {
                latest = Some((date, placed));
            }
        }
        let Some((_, placed)) = latest else {
            return Ok("No runs??".to_string());
        };

        let info = self.run_info(placed).await?;
        Ok(format!(
            "The leaderboard's latest {} run was submitted on {} by {}, with a time of {} ({}). {} is from {}.",
            self.config.category_short,
            info.date,
            info.player,
            info.duration,
            place_text(info.place),
            info.player,
            info.location
        ))
    }

    async fn up_check(&self) -> bool {
        self.get_json::<serde_json::Value>(&self.board_uri(), false)
            .await
            .is_ok()
    }
}
