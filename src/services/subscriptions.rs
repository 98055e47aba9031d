use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::subscription::SubscriptionOffer;

/// The offer in force for each plan at `today`.
///
/// Per plan name this is the offer with the latest `wef` not after `today`;
/// a plan with no effective offer yet is represented by its earliest upcoming
/// one. The result is ordered by `wef`, then plan name.
pub fn current_offers(offers: &[SubscriptionOffer], today: DateTime<Utc>) -> Vec<SubscriptionOffer> {
    let mut by_plan: HashMap<&str, &SubscriptionOffer> = HashMap::new();

    for offer in offers {
        let slot = by_plan.entry(offer.plan_name()).or_insert(offer);
        if prefer(offer, *slot, today) {
            *slot = offer;
        }
    }

    let mut current: Vec<SubscriptionOffer> = by_plan.into_values().cloned().collect();
    current.sort_by(|a, b| a.wef.cmp(&b.wef).then_with(|| a.plan_name().cmp(b.plan_name())));
    current
}

fn prefer(candidate: &SubscriptionOffer, held: &SubscriptionOffer, today: DateTime<Utc>) -> bool {
    match (candidate.is_effective(today), held.is_effective(today)) {
        (true, true) => candidate.wef > held.wef,
        (true, false) => true,
        (false, true) => false,
        (false, false) => candidate.wef < held.wef,
    }
}

/// Every version of one plan, oldest first.
pub fn offers_for_plan(offers: &[SubscriptionOffer], plan_name: &str) -> Vec<SubscriptionOffer> {
    let mut versions: Vec<SubscriptionOffer> = offers
        .iter()
        .filter(|o| o.plan_name() == plan_name)
        .cloned()
        .collect();
    versions.sort_by_key(|o| o.wef);
    versions
}

/// Finds an offer by id.
pub fn find_offer<'a>(offers: &'a [SubscriptionOffer], id: &str) -> Option<&'a SubscriptionOffer> {
    offers.iter().find(|o| o.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subscription::PlanRef;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn offer(id: &str, plan: &str, wef: (i32, u32, u32)) -> SubscriptionOffer {
        SubscriptionOffer {
            id: id.into(),
            master_subscription: Some(PlanRef {
                id: format!("plan-{plan}"),
                name: plan.into(),
            }),
            validity_in_days: 30,
            max_employees: 5,
            display_price: dec!(1000),
            selling_price: dec!(800),
            wef: Utc.with_ymd_and_hms(wef.0, wef.1, wef.2, 0, 0, 0).unwrap(),
        }
    }

    fn today() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn latest_effective_version_wins() {
        let offers = vec![
            offer("g1", "GOLD", (2026, 1, 1)),
            offer("g2", "GOLD", (2026, 5, 1)),
            offer("g3", "GOLD", (2026, 9, 1)),
        ];
        let current = current_offers(&offers, today());
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, "g2");
    }

    #[test]
    fn upcoming_only_plan_uses_earliest() {
        let offers = vec![
            offer("p2", "PLATINUM", (2027, 1, 1)),
            offer("p1", "PLATINUM", (2026, 8, 1)),
            offer("s1", "SILVER", (2026, 2, 1)),
        ];
        let current = current_offers(&offers, today());
        let ids: Vec<&str> = current.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "p1"]);
    }

    #[test]
    fn effective_on_the_day_counts() {
        let offers = vec![
            offer("a", "BASIC", (2026, 6, 15)),
            offer("b", "BASIC", (2026, 3, 1)),
        ];
        assert_eq!(current_offers(&offers, today())[0].id, "a");
    }

    #[test]
    fn versions_are_listed_oldest_first() {
        let offers = vec![
            offer("g3", "GOLD", (2026, 9, 1)),
            offer("s1", "SILVER", (2026, 2, 1)),
            offer("g1", "GOLD", (2026, 1, 1)),
        ];
        let ids: Vec<String> = offers_for_plan(&offers, "GOLD")
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["g1", "g3"]);
        assert!(find_offer(&offers, "s1").is_some());
        assert!(find_offer(&offers, "zz").is_none());
    }
}
