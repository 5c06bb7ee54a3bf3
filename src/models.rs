use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Editorial categories used across the site. Assignment is keyword-based
/// (see [`Category::from_title`]); unknown titles land in `Actualites`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Actualites,
    Debats,
    Culture,
    Sport,
    Jeunesse,
    Economie,
    Politique,
    Sante,
    Societe,
}

/// Keyword table for title-based categorization. First family with a
/// matching keyword wins; order matters.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Actualites,
        &["journal", "info", "actualité", "news", "flash"],
    ),
    (
        Category::Debats,
        &["débat", "franc-parler", "discussion", "franc parler"],
    ),
    (
        Category::Culture,
        &["culture", "festival", "musique", "art", "soleil"],
    ),
    (
        Category::Sport,
        &["sport", "football", "étalons", "match"],
    ),
    (
        Category::Jeunesse,
        &["jeunesse", "jeune", "éducation", "question"],
    ),
    (
        Category::Economie,
        &["économie", "business", "agriculture"],
    ),
    (
        Category::Politique,
        &["politique", "gouvernement", "élection"],
    ),
    (Category::Sante, &["santé", "médecine", "hôpital"]),
    (Category::Societe, &["société", "social", "communauté"]),
];

impl Category {
    /// Categorize a video from its title. Pure keyword matching over the
    /// lowercased title; defaults to `Actualites` when nothing matches.
    #[must_use]
    pub fn from_title(title: &str) -> Self {
        let title_lower = title.to_lowercase();

        for (category, keywords) in CATEGORY_KEYWORDS {
            if keywords.iter().any(|k| title_lower.contains(k)) {
                return *category;
            }
        }

        Category::Actualites
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Actualites => "actualites",
            Category::Debats => "debats",
            Category::Culture => "culture",
            Category::Sport => "sport",
            Category::Jeunesse => "jeunesse",
            Category::Economie => "economie",
            Category::Politique => "politique",
            Category::Sante => "sante",
            Category::Societe => "societe",
        }
    }

    pub const ALL: &'static [Category] = &[
        Category::Actualites,
        Category::Debats,
        Category::Culture,
        Category::Sport,
        Category::Jeunesse,
        Category::Economie,
        Category::Politique,
        Category::Sante,
        Category::Societe,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

/// One channel video as served to the frontend. Built once by the fetch
/// layer and never mutated; counters stay "0" unless a stats lookup ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub published_at: String,
    pub category: Category,
    pub channel_title: String,
    pub view_count: String,
    pub like_count: String,
    pub comment_count: String,
}

/// Live broadcast details for the station's permanent live video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStream {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub is_live: bool,
    pub scheduled_start: Option<String>,
    pub actual_start: Option<String>,
    pub concurrent_viewers: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub video_count: u64,
    pub published_at: String,
}

/// Aggregate counters for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_videos: usize,
    pub total_playlists: usize,
    pub is_live: bool,
    pub concurrent_viewers: Option<String>,
    pub categories: BTreeMap<Category, usize>,
    pub recent_videos: Vec<Video>,
    pub generated_at: DateTime<Utc>,
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when
/// something was cut. Char-based so multi-byte titles never split.
#[must_use]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

/// Editorial demo set served whenever live data cannot be obtained.
/// Structurally identical to real records so the frontend never looks broken.
#[must_use]
pub fn fallback_videos() -> Vec<Video> {
    fn video(
        id: &str,
        title: &str,
        description: &str,
        published_at: &str,
        category: Category,
        view_count: &str,
        like_count: &str,
        comment_count: &str,
    ) -> Video {
        Video {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            thumbnail: format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"),
            published_at: published_at.to_string(),
            category,
            channel_title: "LCA TV".to_string(),
            view_count: view_count.to_string(),
            like_count: like_count.to_string(),
            comment_count: comment_count.to_string(),
        }
    }

    vec![
        video(
            "eSApphrRKWg",
            "Journal LCA TV - Édition du Soir",
            "Retrouvez l'actualité nationale et internationale avec notre équipe de journalistes professionnels.",
            "2024-12-15T19:00:00Z",
            Category::Actualites,
            "15420",
            "234",
            "45",
        ),
        video(
            "xJatmbxIaIM",
            "Franc-Parler - Débat sur l'Économie Burkinabè",
            "Un débat enrichissant sur les enjeux économiques du Burkina Faso avec des experts.",
            "2024-12-14T20:30:00Z",
            Category::Debats,
            "8750",
            "156",
            "67",
        ),
        video(
            "8aIAKRe4Spo",
            "Festival des Masques de Dédougou - Reportage Culture",
            "Découvrez la richesse culturelle du Burkina Faso à travers ce festival traditionnel.",
            "2024-12-13T18:00:00Z",
            Category::Culture,
            "12300",
            "298",
            "89",
        ),
        video(
            "R2EocmxeJ5Q",
            "Étalons du Burkina - Qualification CAN 2024",
            "Suivez les Étalons dans leur match crucial de qualification pour la CAN.",
            "2024-12-12T21:00:00Z",
            Category::Sport,
            "25600",
            "567",
            "123",
        ),
        video(
            "pMlWnB5Wj3Q",
            "Questions de Femmes - L'Entrepreneuriat au Burkina",
            "Une émission dédiée aux femmes entrepreneures burkinabè et leurs succès.",
            "2024-12-11T17:30:00Z",
            Category::Jeunesse,
            "6890",
            "134",
            "34",
        ),
        video(
            "ixQEmhTbvTI",
            "Soleil d'Afrique - Musique et Culture",
            "Découvrez la musique africaine authentique et les artistes du continent.",
            "2024-12-10T11:00:00Z",
            Category::Culture,
            "9450",
            "187",
            "56",
        ),
    ]
}
