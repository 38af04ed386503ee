//! Dictionary lookup.
//!
//! [`MerriamWebster`] calls the Collegiate Dictionary JSON API and flattens
//! its entries into [`Sense`]s. The payload is an array that holds either
//! entry objects or, when the word is unknown, plain spelling suggestions.
//!
//! # Headword selection
//!
//! The API also returns run-ons and related words (`enamored` for
//! `enamor`). Only entries sharing the first entry's headword are kept:
//! the first headword returned is taken to be the one looked up.
//!
//! # Audio
//!
//! Pronunciation audio is addressed by a token; the file lives under a
//! subdirectory derived from that token (see [`audio_subdirectory`]).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::LexiconConfig;
use crate::error::LookupError;
use crate::models::{Lookup, Pronunciation, Sense};
use crate::traits::Lexicon;

/// Syllable break marker in raw headwords.
const BREAK_MARKER: char = '*';
const INTERPUNCT: char = '·';

/// Lexicon used when no dictionary is configured: every word is unknown.
pub struct DisabledLexicon;

#[async_trait]
impl Lexicon for DisabledLexicon {
    async fn lookup(&self, _word: &str) -> Result<Lookup, LookupError> {
        Ok(Lookup::NotFound {
            suggestions: Vec::new(),
        })
    }
}

/// Merriam-Webster Collegiate Dictionary client.
pub struct MerriamWebster {
    client: reqwest::Client,
    base_url: String,
    audio_base: String,
    api_key: String,
}

impl MerriamWebster {
    /// Build a client; the API key is read from `config.key_env`.
    pub fn new(config: &LexiconConfig) -> Result<Self, LookupError> {
        let api_key = std::env::var(&config.key_env)
            .map_err(|_| LookupError::MissingKey(config.key_env.clone()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            audio_base: config.audio_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url_for(&self, word: &str) -> Result<reqwest::Url, LookupError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| LookupError::Transport(format!("bad base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| LookupError::Transport("base url cannot have a path".into()))?
            .push(word);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl Lexicon for MerriamWebster {
    async fn lookup(&self, word: &str) -> Result<Lookup, LookupError> {
        let url = self.url_for(word)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;
        parse_response(&json, &self.audio_base)
    }
}

/// Build the configured lexicon.
pub fn create_lexicon(config: &LexiconConfig) -> Result<Box<dyn Lexicon>, LookupError> {
    match config.provider.as_str() {
        "merriam-webster" => Ok(Box::new(MerriamWebster::new(config)?)),
        _ => Ok(Box::new(DisabledLexicon)),
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    hwi: RawHeadwordInfo,
    #[serde(default)]
    fl: String,
    #[serde(default)]
    shortdef: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHeadwordInfo {
    #[serde(default)]
    hw: String,
    #[serde(default)]
    prs: Vec<RawPronunciation>,
}

#[derive(Debug, Deserialize)]
struct RawPronunciation {
    mw: Option<String>,
    sound: Option<RawSound>,
}

#[derive(Debug, Deserialize)]
struct RawSound {
    audio: Option<String>,
}

/// Translate a raw API payload.
pub fn parse_response(json: &Value, audio_base: &str) -> Result<Lookup, LookupError> {
    let items = json
        .as_array()
        .ok_or_else(|| LookupError::Decode("expected a JSON array".into()))?;

    if items.iter().all(Value::is_string) {
        let suggestions = items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        return Ok(Lookup::NotFound { suggestions });
    }

    let mut senses: Vec<Sense> = Vec::new();
    for item in items.iter().filter(|v| v.is_object()) {
        let raw: RawEntry = serde_json::from_value(item.clone())
            .map_err(|e| LookupError::Decode(e.to_string()))?;
        if raw.shortdef.is_empty() {
            continue;
        }
        senses.push(to_sense(raw, audio_base));
    }

    let Some(first) = senses.first().map(|s| s.headword.clone()) else {
        return Ok(Lookup::NotFound {
            suggestions: Vec::new(),
        });
    };
    senses.retain(|s| s.headword == first);
    Ok(Lookup::Found(senses))
}

fn to_sense(raw: RawEntry, audio_base: &str) -> Sense {
    let pronunciations = raw
        .hwi
        .prs
        .into_iter()
        .map(|pr| Pronunciation {
            phonetic: pr.mw.filter(|s| !s.is_empty()),
            audio_url: pr
                .sound
                .and_then(|s| s.audio)
                .and_then(|token| audio_url(audio_base, &token)),
        })
        .filter(|pr| pr.phonetic.is_some() || pr.audio_url.is_some())
        .collect();

    Sense {
        headword: normalize_headword(&raw.hwi.hw),
        part_of_speech: raw.fl,
        definitions: raw.shortdef,
        pronunciations,
    }
}

/// Replace syllable break markers with a visible interpunct.
pub fn normalize_headword(raw: &str) -> String {
    raw.replace(BREAK_MARKER, &INTERPUNCT.to_string())
}

/// Subdirectory holding the audio file for `token`.
///
/// `bix*` and `gg*` tokens have their own directories, tokens starting
/// with a digit or punctuation live under `number`, everything else under
/// its first letter.
pub fn audio_subdirectory(token: &str) -> Option<String> {
    let first = token.chars().next()?;
    let dir = if token.starts_with("bix") {
        "bix".to_string()
    } else if token.starts_with("gg") {
        "gg".to_string()
    } else if first.is_ascii_digit() || first.is_ascii_punctuation() {
        "number".to_string()
    } else {
        first.to_string()
    };
    Some(dir)
}

pub fn audio_url(audio_base: &str, token: &str) -> Option<String> {
    let dir = audio_subdirectory(token)?;
    Some(format!("{}/{}/{}.mp3", audio_base, dir, token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const AUDIO: &str = "https://media.merriam-webster.com/audio/prons/en/us/mp3";

    #[test]
    fn test_audio_subdirectory_classes() {
        assert_eq!(audio_subdirectory("bix123").as_deref(), Some("bix"));
        assert_eq!(audio_subdirectory("gg45").as_deref(), Some("gg"));
        assert_eq!(audio_subdirectory("7abc").as_deref(), Some("number"));
        assert_eq!(audio_subdirectory("_under").as_deref(), Some("number"));
        assert_eq!(audio_subdirectory("zoo01").as_deref(), Some("z"));
        assert_eq!(audio_subdirectory(""), None);
    }

    #[test]
    fn test_audio_url_template() {
        assert_eq!(
            audio_url(AUDIO, "enamor01").unwrap(),
            "https://media.merriam-webster.com/audio/prons/en/us/mp3/e/enamor01.mp3"
        );
    }

    #[test]
    fn test_headword_interpunct() {
        assert_eq!(normalize_headword("id*io*syn*crat*ic"), "id·io·syn·crat·ic");
    }

    #[test]
    fn test_suggestions_mean_not_found() {
        let payload = json!(["enamel", "enamour"]);
        assert_eq!(
            parse_response(&payload, AUDIO).unwrap(),
            Lookup::NotFound {
                suggestions: vec!["enamel".into(), "enamour".into()]
            }
        );
        assert_eq!(
            parse_response(&json!([]), AUDIO).unwrap(),
            Lookup::NotFound {
                suggestions: vec![]
            }
        );
    }

    #[test]
    fn test_first_headword_wins() {
        let payload = json!([
            {
                "meta": { "id": "enamor" },
                "hwi": { "hw": "en*am*or", "prs": [{ "mw": "i-ˈna-mər", "sound": { "audio": "enamor01" } }] },
                "fl": "verb",
                "shortdef": ["to inflame with love"]
            },
            {
                "meta": { "id": "enamored" },
                "hwi": { "hw": "en*am*ored" },
                "fl": "adjective",
                "shortdef": ["being in love"]
            },
            {
                "meta": { "id": "enamor:2" },
                "hwi": { "hw": "en*am*or" },
                "fl": "noun",
                "shortdef": ["archaic love"]
            }
        ]);
        let Lookup::Found(senses) = parse_response(&payload, AUDIO).unwrap() else {
            panic!("expected senses");
        };
        assert_eq!(senses.len(), 2);
        assert_eq!(senses[0].headword, "en·am·or");
        assert_eq!(senses[0].part_of_speech, "verb");
        assert_eq!(
            senses[0].pronunciations[0].audio_url.as_deref(),
            Some("https://media.merriam-webster.com/audio/prons/en/us/mp3/e/enamor01.mp3")
        );
        assert_eq!(senses[1].part_of_speech, "noun");
        assert!(senses[1].pronunciations.is_empty());
    }

    #[test]
    fn test_entries_without_definitions_dropped() {
        let payload = json!([{ "hwi": { "hw": "x" }, "fl": "noun", "shortdef": [] }]);
        assert!(matches!(
            parse_response(&payload, AUDIO).unwrap(),
            Lookup::NotFound { .. }
        ));
    }

    #[test]
    fn test_non_array_is_decode_error() {
        assert!(matches!(
            parse_response(&json!({ "error": "bad key" }), AUDIO),
            Err(LookupError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_disabled_lexicon_never_finds() {
        let found = DisabledLexicon.lookup("enamor").await.unwrap();
        assert!(matches!(found, Lookup::NotFound { .. }));
    }
}
