use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::lexicon::create_lexicon;
use crate::models::{Lookup, Sense};

/// Render senses the way `vocab lookup` prints them.
pub fn format_senses(senses: &[Sense]) -> String {
    let mut out = String::new();
    for (i, sense) in senses.iter().enumerate() {
        out.push_str(&format!("{}. {} ({})\n", i + 1, sense.headword, sense.part_of_speech));
        for pr in &sense.pronunciations {
            let phonetic = pr.phonetic.as_deref().unwrap_or("-");
            match &pr.audio_url {
                Some(url) => out.push_str(&format!("   \\{}\\  {}\n", phonetic, url)),
                None => out.push_str(&format!("   \\{}\\\n", phonetic)),
            }
        }
        for def in &sense.definitions {
            out.push_str(&format!("   - {}\n", def));
        }
    }
    out
}

pub async fn run_lookup(config: &Config, word: &str) -> Result<()> {
    if !config.lexicon.is_enabled() {
        bail!("No dictionary configured (set [lexicon].provider)");
    }
    let lexicon = create_lexicon(&config.lexicon).context("Failed to initialize dictionary")?;
    match lexicon
        .lookup(word)
        .await
        .with_context(|| format!("Lookup for '{}' failed", word))?
    {
        Lookup::Found(senses) => print!("{}", format_senses(&senses)),
        Lookup::NotFound { suggestions } => {
            println!("'{}' not found", word);
            if !suggestions.is_empty() {
                println!("did you mean: {}", suggestions.join(", "));
            }
        }
    }
    Ok(())
}
