use crate::advice::client::{AdviceGenerator, GeminiClient, UnavailableAdvisor};
use crate::config::AppConfig;
use crate::foods::client::{FoodLookup, OpenFoodFactsClient};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub foods: Arc<dyn FoodLookup>,
    pub advisor: Arc<dyn AdviceGenerator>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let foods = Arc::new(
            OpenFoodFactsClient::from_config(&config.food_db).context("build food database client")?,
        ) as Arc<dyn FoodLookup>;

        // Without Gemini the advice endpoint degrades to 503; food search keeps working.
        let advisor = match GeminiClient::from_config(&config.gemini, &config.food_db.user_agent) {
            Ok(client) => {
                info!(model = %config.gemini.model, "gemini client configured");
                Arc::new(client) as Arc<dyn AdviceGenerator>
            }
            Err(e) => {
                warn!(error = %e, "gemini client not configured; /api/calculate_needs will answer 503");
                Arc::new(UnavailableAdvisor::new(e.to_string())) as Arc<dyn AdviceGenerator>
            }
        };

        Ok(Self::from_parts(config, foods, advisor))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        foods: Arc<dyn FoodLookup>,
        advisor: Arc<dyn AdviceGenerator>,
    ) -> Self {
        Self {
            config,
            foods,
            advisor,
        }
    }
}

#[cfg(test)]
pub(crate) struct NoFoods;

#[cfg(test)]
#[async_trait::async_trait]
impl FoodLookup for NoFoods {
    async fn lookup_by_barcode(
        &self,
        _barcode: &str,
    ) -> Result<Option<crate::foods::dto::Product>, crate::foods::client::FoodError> {
        Ok(None)
    }

    async fn search_by_name(
        &self,
        _query: &str,
        _limit: u32,
        _lang: &str,
    ) -> Result<Vec<crate::foods::dto::Product>, crate::foods::client::FoodError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
impl AppState {
    /// State with fake clients; `None` installs the unconfigured advisor.
    pub fn for_tests(
        foods: Arc<dyn FoodLookup>,
        advisor: Option<Arc<dyn AdviceGenerator>>,
    ) -> Self {
        let advisor = advisor.unwrap_or_else(|| {
            Arc::new(UnavailableAdvisor::new("GEMINI_API_KEY environment variable not set"))
                as Arc<dyn AdviceGenerator>
        });
        Self::from_parts(
            Arc::new(AppConfig::for_tests("http://127.0.0.1:9", None)),
            foods,
            advisor,
        )
    }
}
