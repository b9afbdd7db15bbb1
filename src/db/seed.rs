use crate::domain::metrics::MetricKind;
use crate::domain::plan::{
    ActionCategory, ActionTemplate, Difficulty, MetricTarget, TargetCondition,
};
use anyhow::Result;
use sqlx::PgPool;

struct SeedTemplate<'a> {
    id: &'a str,
    title: &'a str,
    description: &'a str,
    category: ActionCategory,
    minutes: i16,
    difficulty: Difficulty,
    targets: &'a [(MetricKind, TargetCondition, i16)],
    tags: &'a [&'a str],
    anchor: Option<&'a str>,
}

const CATALOG: &[SeedTemplate<'static>] = &[
    SeedTemplate {
        id: "box-breathing",
        title: "Box breathing",
        description: "Breathe in for 4, hold for 4, out for 4, hold for 4. Repeat five times.",
        category: ActionCategory::Coping,
        minutes: 3,
        difficulty: Difficulty::Easy,
        targets: &[
            (MetricKind::Stress, TargetCondition::High, 6),
            (MetricKind::Anxiety, TargetCondition::High, 6),
        ],
        tags: &["stress", "anxiety"],
        anchor: Some("morning"),
    },
    SeedTemplate {
        id: "worry-window",
        title: "Worry window",
        description: "Write down every worry for ten minutes, then close the notebook.",
        category: ActionCategory::Coping,
        minutes: 10,
        difficulty: Difficulty::Medium,
        targets: &[(MetricKind::Anxiety, TargetCondition::High, 5)],
        tags: &["anxiety"],
        anchor: Some("afternoon"),
    },
    SeedTemplate {
        id: "three-good-things",
        title: "Three good things",
        description: "Note three things that went okay today, however small.",
        category: ActionCategory::Coping,
        minutes: 5,
        difficulty: Difficulty::Easy,
        targets: &[(MetricKind::Mood, TargetCondition::Low, 5)],
        tags: &["mood"],
        anchor: Some("evening"),
    },
    SeedTemplate {
        id: "body-scan",
        title: "Guided body scan",
        description: "Lie down and move your attention slowly from toes to head.",
        category: ActionCategory::Coping,
        minutes: 20,
        difficulty: Difficulty::Hard,
        targets: &[
            (MetricKind::Stress, TargetCondition::High, 5),
            (MetricKind::Sleep, TargetCondition::Low, 5),
        ],
        tags: &["stress", "sleep"],
        anchor: Some("before bed"),
    },
    SeedTemplate {
        id: "glass-of-water",
        title: "Glass of water",
        description: "Drink a full glass of water before your first coffee.",
        category: ActionCategory::Lifestyle,
        minutes: 1,
        difficulty: Difficulty::Easy,
        targets: &[(MetricKind::Energy, TargetCondition::Low, 5)],
        tags: &["energy"],
        anchor: Some("morning"),
    },
    SeedTemplate {
        id: "short-walk",
        title: "Ten-minute walk",
        description: "Step outside and walk at an easy pace for ten minutes.",
        category: ActionCategory::Lifestyle,
        minutes: 10,
        difficulty: Difficulty::Medium,
        targets: &[
            (MetricKind::Mood, TargetCondition::Low, 5),
            (MetricKind::Energy, TargetCondition::Low, 5),
        ],
        tags: &["mood", "energy", "movement"],
        anchor: Some("after lunch"),
    },
    SeedTemplate {
        id: "screen-curfew",
        title: "Screen curfew",
        description: "Put screens away an hour before bed.",
        category: ActionCategory::Lifestyle,
        minutes: 60,
        difficulty: Difficulty::Hard,
        targets: &[(MetricKind::Sleep, TargetCondition::Low, 6)],
        tags: &["sleep"],
        anchor: Some("evening"),
    },
    SeedTemplate {
        id: "focus-block",
        title: "One focus block",
        description: "Pick one task and work on it for 25 minutes with notifications off.",
        category: ActionCategory::Lifestyle,
        minutes: 25,
        difficulty: Difficulty::Medium,
        targets: &[(MetricKind::Focus, TargetCondition::Low, 5)],
        tags: &["focus", "work"],
        anchor: None,
    },
    SeedTemplate {
        id: "send-a-message",
        title: "Send one message",
        description: "Text someone you like, even just to say hi.",
        category: ActionCategory::Connection,
        minutes: 2,
        difficulty: Difficulty::Easy,
        targets: &[(MetricKind::Mood, TargetCondition::Low, 4)],
        tags: &["mood", "relationships"],
        anchor: None,
    },
    SeedTemplate {
        id: "call-a-friend",
        title: "Call a friend",
        description: "A ten-minute call with someone who makes you feel at ease.",
        category: ActionCategory::Connection,
        minutes: 10,
        difficulty: Difficulty::Medium,
        targets: &[
            (MetricKind::Mood, TargetCondition::Low, 5),
            (MetricKind::Anxiety, TargetCondition::High, 6),
        ],
        tags: &["relationships", "anxiety"],
        anchor: Some("evening"),
    },
    SeedTemplate {
        id: "shared-meal",
        title: "Share a meal",
        description: "Eat one meal today with someone else, in person or on video.",
        category: ActionCategory::Connection,
        minutes: 30,
        difficulty: Difficulty::Hard,
        targets: &[(MetricKind::Mood, TargetCondition::Low, 6)],
        tags: &["relationships"],
        anchor: Some("dinner"),
    },
];

/// The built-in action catalog.
pub fn default_catalog() -> Vec<ActionTemplate> {
    CATALOG
        .iter()
        .map(|seed| ActionTemplate {
            id: seed.id.to_string(),
            title: seed.title.to_string(),
            description: seed.description.to_string(),
            category: seed.category,
            duration_minutes: seed.minutes,
            targets: seed
                .targets
                .iter()
                .map(|&(metric, condition, threshold)| MetricTarget {
                    metric,
                    condition,
                    threshold,
                })
                .collect(),
            focus_tags: seed.tags.iter().map(|t| t.to_string()).collect(),
            difficulty: seed.difficulty,
            default_anchor: seed.anchor.map(str::to_string),
            active: true,
        })
        .collect()
}

pub async fn seed_catalog(pool: &PgPool) -> Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM action_templates")
        .fetch_one(pool)
        .await?;

    if count.0 > 0 {
        tracing::info!("Action catalog already seeded ({} templates)", count.0);
        return Ok(());
    }

    let templates = default_catalog();
    for template in &templates {
        sqlx::query(
            r#"
            INSERT INTO action_templates
                (id, title, description, category, duration_minutes, targets,
                 focus_tags, difficulty, default_anchor, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&template.id)
        .bind(&template.title)
        .bind(&template.description)
        .bind(template.category.as_str())
        .bind(template.duration_minutes)
        .bind(serde_json::to_value(&template.targets)?)
        .bind(&template.focus_tags)
        .bind(template.difficulty.as_str())
        .bind(&template.default_anchor)
        .bind(template.active)
        .execute(pool)
        .await?;
    }

    tracing::info!("Seeded {} action templates", templates.len());
    Ok(())
}
