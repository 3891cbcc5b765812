//! Prompt assembly for the nutrition advisor.
//!
//! The prompt is a pure function of the profile and the response language so
//! identical requests always produce identical model input.

use super::dto::{ProfileValue, UserProfile};

/// Placeholder for anything the user left out.
pub const NOT_AVAILABLE: &str = "N/D";

const ACTIVITY_LEVELS: [(&str, &str); 5] = [
    ("sedentary", "Sedentary (little or no exercise)"),
    ("light", "Lightly active (light exercise/sport 1-3 days a week)"),
    ("moderate", "Moderately active (moderate exercise/sport 3-5 days a week)"),
    ("active", "Very active (hard exercise/sport 6-7 days a week)"),
    (
        "extra_active",
        "Extremely active (very hard exercise or physical job)",
    ),
];

const EXAMPLE_RESPONSE: &str = r#"{"calories": 2200, "protein": 110, "carbs": 275, "fat": 73, "notes": "Given your maintenance goal and moderate activity this intake should be adequate. Track your weight and adjust calories if needed.", "personalized_advice": ["Spread protein evenly across meals.", "Prefer whole grains for most of your carbohydrates."]}"#;

/// Descriptive phrase for a known activity code; unknown codes pass through.
pub fn activity_description(code: &str) -> &str {
    let key = code.trim();
    ACTIVITY_LEVELS
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, description)| *description)
        .unwrap_or(key)
}

fn or_na(v: &Option<ProfileValue>) -> String {
    v.as_ref()
        .filter(|v| !v.is_blank())
        .map(ToString::to_string)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn build_prompt(profile: &UserProfile, language: &str) -> String {
    let activity = profile
        .activity_level
        .as_ref()
        .filter(|v| !v.is_blank())
        .map(|v| activity_description(&v.to_string()).to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let lines = [
        "You are a virtual nutrition expert. Analyse the user's data and estimate their daily calorie requirement together with a recommended split of macronutrients (protein, carbohydrates, fat) expressed in grams.".to_string(),
        "Take every parameter into account to make the estimate as accurate as possible.".to_string(),
        "Also provide a short note and a few personalised tips based on the user's objectives, medical conditions, allergies and intolerances.".to_string(),
        String::new(),
        "User data:".to_string(),
        format!("- Age: {} years", or_na(&profile.age)),
        format!("- Weight: {} kg", or_na(&profile.weight)),
        format!("- Height: {} cm", or_na(&profile.height)),
        format!("- Biological sex: {}", or_na(&profile.gender)),
        format!("- Physical activity level: {activity}"),
        format!("- Activity/profession details: {}", or_na(&profile.profession)),
        format!("- Main objectives: {}", or_na(&profile.objectives)),
        format!("- Medical conditions: {}", or_na(&profile.medical_conditions)),
        format!("- Allergies: {}", or_na(&profile.allergies)),
        format!("- Intolerances: {}", or_na(&profile.intolerances)),
        String::new(),
        "RESPONSE INSTRUCTIONS:".to_string(),
        "Format your answer ONLY as a single valid JSON object. Do not add any text before or after the JSON object and do not use markdown (such as ```json).".to_string(),
        "The JSON object must contain the following keys:".to_string(),
        "  \"calories\": (integer, estimated daily energy requirement in kcal),".to_string(),
        "  \"protein\": (integer, recommended grams of protein per day),".to_string(),
        "  \"carbs\": (integer, recommended grams of carbohydrates per day),".to_string(),
        "  \"fat\": (integer, recommended grams of fat per day),".to_string(),
        "  \"notes\": (string, a short relevant note, at most 2-3 sentences),".to_string(),
        "  \"personalized_advice\": (array of strings, 2-4 short practical tips).".to_string(),
        format!("Write \"notes\" and \"personalized_advice\" in {language}."),
        String::new(),
        "Example of the expected JSON output:".to_string(),
        EXAMPLE_RESPONSE.to_string(),
    ];
    lines.join("\n")
}

#[cfg(test)]
mod prompt_tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> UserProfile {
        serde_json::from_value(json!({
            "age": 30, "weight": 70, "height": 175, "gender": "male",
            "activity_level": "moderate", "objectives": "maintenance"
        }))
        .unwrap()
    }

    #[test]
    fn known_activity_codes_are_described() {
        assert_eq!(
            activity_description("light"),
            "Lightly active (light exercise/sport 1-3 days a week)"
        );
        assert_eq!(
            activity_description("Extra_Active"),
            "Extremely active (very hard exercise or physical job)"
        );
    }

    #[test]
    fn unknown_activity_code_passes_through() {
        assert_eq!(activity_description("marathoner"), "marathoner");
    }

    #[test]
    fn prompt_carries_profile_values() {
        let prompt = build_prompt(&minimal(), "Italian");
        assert!(prompt.contains("- Age: 30 years"));
        assert!(prompt.contains("- Weight: 70 kg"));
        assert!(prompt.contains("- Height: 175 cm"));
        assert!(prompt.contains("- Biological sex: male"));
        assert!(prompt.contains("Moderately active"));
        assert!(prompt.contains("- Main objectives: maintenance"));
        assert!(prompt.contains("in Italian."));
    }

    #[test]
    fn missing_optionals_become_placeholder() {
        let prompt = build_prompt(&minimal(), "Italian");
        assert!(prompt.contains("- Activity/profession details: N/D"));
        assert!(prompt.contains("- Medical conditions: N/D"));
        assert!(prompt.contains("- Allergies: N/D"));
        assert!(prompt.contains("- Intolerances: N/D"));
    }

    #[test]
    fn prompt_lists_every_response_key() {
        let prompt = build_prompt(&UserProfile::default(), "English");
        for key in ["calories", "protein", "carbs", "fat", "notes", "personalized_advice"] {
            assert!(prompt.contains(&format!("\"{key}\"")), "missing {key}");
        }
        assert!(prompt.contains("- Age: N/D years"));
    }

    #[test]
    fn prompt_is_deterministic() {
        assert_eq!(
            build_prompt(&minimal(), "Italian"),
            build_prompt(&minimal(), "Italian")
        );
    }
}
