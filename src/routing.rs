//! Rule-based lead routing.
//!
//! Rules are evaluated highest priority first; the first rule whose
//! criteria all match wins. A criterion that is absent matches anything,
//! so a rule with no criteria is a catch-all.

use crate::models::{EnrichedLead, RoutingRule};

/// Picks the routing rule for a lead, or None when nothing matches.
///
/// Rules are sorted by descending priority with the name as a
/// deterministic tie-break, so the same lead and rule set always route
/// the same way. Malformed rules are skipped with a warning instead of
/// poisoning the whole set.
pub fn match_rule<'a>(rules: &'a [RoutingRule], lead: &EnrichedLead) -> Option<&'a RoutingRule> {
    let mut ordered: Vec<&RoutingRule> = rules.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

    for rule in ordered {
        if let Some(reason) = malformed_reason(rule) {
            tracing::warn!("Routing: skipping malformed rule '{}': {}", rule.name, reason);
            continue;
        }
        if rule_matches(rule, lead) {
            tracing::info!(
                "Routing: lead {} matched rule '{}' (priority {})",
                lead.id,
                rule.name,
                rule.priority
            );
            return Some(rule);
        }
    }

    tracing::info!("Routing: lead {} matched no rule", lead.id);
    None
}

fn malformed_reason(rule: &RoutingRule) -> Option<&'static str> {
    if let (Some(min), Some(max)) = (rule.criteria_min_score, rule.criteria_max_score) {
        if min > max {
            return Some("min score above max score");
        }
    }
    if rule.webhook_enabled
        && rule
            .webhook_url
            .as_deref()
            .map_or(true, |u| u.trim().is_empty())
    {
        return Some("webhook enabled without a URL");
    }
    None
}

fn rule_matches(rule: &RoutingRule, lead: &EnrichedLead) -> bool {
    if !any_of_matches(&rule.criteria_industry, lead.company.industry.as_deref()) {
        return false;
    }
    if !any_of_matches(&rule.criteria_state, lead.company.hq_state.as_deref()) {
        return false;
    }
    if !any_of_matches(&rule.criteria_lead_type, lead.lead_type.as_deref()) {
        return false;
    }

    let score = i32::from(lead.confidence_score);
    if let Some(min) = rule.criteria_min_score {
        if score < min {
            return false;
        }
    }
    if let Some(max) = rule.criteria_max_score {
        if score > max {
            return false;
        }
    }

    true
}

/// Case-insensitive "any of" criterion. Absent criterion is a wildcard;
/// a present criterion never matches a lead that lacks the field.
fn any_of_matches(criterion: &Option<Vec<String>>, value: Option<&str>) -> bool {
    match criterion {
        None => true,
        Some(accepted) => match value {
            None => false,
            Some(v) => accepted.iter().any(|a| a.eq_ignore_ascii_case(v)),
        },
    }
}
