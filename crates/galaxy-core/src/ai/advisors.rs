//! Reference advisors. They keep an AI civilization ticking over; they are
//! not meant to play well.

use async_trait::async_trait;
use serde_json::json;

use crate::civilization::Resource;
use crate::player::AiPersonality;

use super::{AiModule, DecisionContext, OpportunityKind, ProposedAction};

/// Credits below which the financial advisor tightens spending
const AUSTERITY_THRESHOLD: u64 = 2_000;
const TRADE_SURPLUS: u64 = 500;
const TRADE_LOT: u64 = 50;

#[derive(Debug, Default)]
pub struct FinancialAdvisor;

#[async_trait]
impl AiModule for FinancialAdvisor {
    fn name(&self) -> &str {
        "financial"
    }

    async fn get_decisions(
        &mut self,
        context: &DecisionContext,
    ) -> anyhow::Result<Vec<ProposedAction>> {
        let resources = &context.civilization.resources;

        if resources.get(Resource::Credits) < AUSTERITY_THRESHOLD {
            let already = context
                .civilization
                .policies
                .iter()
                .any(|p| p.name == "austerity");
            if already {
                return Ok(Vec::new());
            }
            return Ok(vec![ProposedAction::new(
                "policy",
                json!({ "name": "austerity", "public": false }),
            )]);
        }

        let partner = context
            .opportunities
            .iter()
            .find(|o| o.kind == OpportunityKind::Trade);
        match partner {
            Some(partner) if resources.get(Resource::Minerals) > TRADE_SURPLUS => {
                Ok(vec![ProposedAction::new(
                    "trade",
                    json!({
                        "partner": partner.partner,
                        "resource": Resource::Minerals,
                        "amount": TRADE_LOT,
                    }),
                )])
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MilitaryAdvisor;

#[async_trait]
impl AiModule for MilitaryAdvisor {
    fn name(&self) -> &str {
        "military"
    }

    async fn get_decisions(
        &mut self,
        context: &DecisionContext,
    ) -> anyhow::Result<Vec<ProposedAction>> {
        let aggressive = context
            .civilization
            .ai_state
            .as_ref()
            .is_some_and(|s| s.profile.personality == AiPersonality::Aggressive);

        if context.is_threatened() {
            let strength = 25 * context.threats.len() as i64;
            return Ok(vec![ProposedAction::new(
                "military",
                json!({ "strength": strength, "readiness": 0.95 }),
            )]);
        }

        if aggressive {
            return Ok(vec![ProposedAction::new(
                "military",
                json!({ "strength": 10 }),
            )]);
        }

        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civilization::{FoundingRequest, Genesis, Stance};
    use crate::ids::PlayerId;
    use std::sync::Arc;

    fn context_with(stance: Option<Stance>, credits: u64) -> DecisionContext {
        let mut civ = Genesis::new(9).found(
            FoundingRequest::new("a".into(), PlayerId::from("ai_a"), "AI"),
            &Default::default(),
        );
        civ.resources.set(Resource::Credits, credits);
        if let Some(stance) = stance {
            civ.relations.with.insert("b".into(), stance);
        }
        DecisionContext::assemble(1, civ, Arc::default(), Vec::new(), Vec::new())
    }

    #[tokio::test]
    async fn financial_advisor_trades_with_friends() {
        let proposals = FinancialAdvisor
            .get_decisions(&context_with(Some(Stance::Friendly), 10_000))
            .await
            .unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].kind, "trade");
        assert_eq!(proposals[0].payload["partner"], "b");
    }

    #[tokio::test]
    async fn financial_advisor_cuts_spending_when_poor() {
        let proposals = FinancialAdvisor
            .get_decisions(&context_with(None, 100))
            .await
            .unwrap();
        assert_eq!(proposals[0].kind, "policy");
    }

    #[tokio::test]
    async fn military_advisor_reacts_to_threats() {
        let calm = MilitaryAdvisor
            .get_decisions(&context_with(Some(Stance::Neutral), 10_000))
            .await
            .unwrap();
        assert!(calm.is_empty());

        let alarmed = MilitaryAdvisor
            .get_decisions(&context_with(Some(Stance::Hostile), 10_000))
            .await
            .unwrap();
        assert_eq!(alarmed[0].payload["strength"], 25);
    }
}
