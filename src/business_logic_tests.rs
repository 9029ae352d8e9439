#[cfg(test)]
mod tests {
    use crate::workflow::{
        quote_for_land, CropsInput, LandUnit, PaymentMethod, PaymentStatus, RequestStatus,
    };
    use rust_decimal::Decimal;

    /// Base pricing covers up to 5000 sq.ft with one test.
    #[test]
    fn test_quote_base_plot() {
        let quote = quote_for_land(Decimal::from(4000), LandUnit::SquareFeet);
        assert_eq!(quote.number_of_tests, 1);
        assert_eq!(quote.total_cost, 3000);

        let quote = quote_for_land(Decimal::from(5000), LandUnit::SquareFeet);
        assert_eq!(quote.number_of_tests, 1);
        assert_eq!(quote.total_cost, 3000);
    }

    /// 6000 sq.ft needs ceil(6000/5000) = 2 tests: 1500 + 1500 + 1 * 700.
    #[test]
    fn test_quote_additional_increment() {
        let quote = quote_for_land(Decimal::from(6000), LandUnit::SquareFeet);
        assert_eq!(quote.number_of_tests, 2);
        assert_eq!(quote.total_cost, 3700);
    }

    /// One acre is 43560 sq.ft -> ceil(8.712) = 9 tests.
    #[test]
    fn test_quote_acre_conversion() {
        let quote = quote_for_land(Decimal::from(1), LandUnit::Acres);
        assert_eq!(quote.number_of_tests, 9);
        assert_eq!(quote.total_cost, 3000 + 8 * 700);
    }

    /// Zero or negative land sizes fall back to a single base test.
    #[test]
    fn test_quote_non_positive_land() {
        let quote = quote_for_land(Decimal::ZERO, LandUnit::SquareFeet);
        assert_eq!(quote.number_of_tests, 1);
        assert_eq!(quote.total_cost, 3000);

        let quote = quote_for_land(Decimal::from(-5), LandUnit::Acres);
        assert_eq!(quote.number_of_tests, 1);
        assert_eq!(quote.total_cost, 3000);
    }

    #[test]
    fn test_status_forward_transitions() {
        use RequestStatus::*;

        assert!(Pending.can_transition_to(Scheduled));
        assert!(Scheduled.can_transition_to(SampleCollected));
        assert!(SampleCollected.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));

        // The agent flow jumps straight from Pending to Sample Collected
        assert!(Pending.can_transition_to(SampleCollected));
        assert!(SampleCollected.can_transition_to(Completed));
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        use RequestStatus::*;

        assert!(!Scheduled.can_transition_to(Pending));
        assert!(!SampleCollected.can_transition_to(Scheduled));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(InProgress));
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        use RequestStatus::*;

        for target in [Pending, Scheduled, SampleCollected, InProgress, Completed, Cancelled] {
            assert!(!Completed.can_transition_to(target));
            assert!(!Cancelled.can_transition_to(target));
        }

        // Every non-terminal state can still be cancelled
        for from in [Pending, Scheduled, SampleCollected, InProgress] {
            assert!(from.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn test_payment_initial_state_by_method() {
        assert_eq!(
            PaymentStatus::initial_for(PaymentMethod::Cash),
            PaymentStatus::CocPending
        );
        assert_eq!(
            PaymentStatus::initial_for(PaymentMethod::Card),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_admin_payment_rules() {
        use PaymentStatus::*;

        // Paid can be forced from anywhere except itself
        assert!(PaymentStatus::admin_can_set(Pending, Paid));
        assert!(PaymentStatus::admin_can_set(CocPending, Paid));
        assert!(PaymentStatus::admin_can_set(CompletedCoc, Paid));
        assert!(!PaymentStatus::admin_can_set(Paid, Paid));

        // CompletedCOC only closes out a pending cash collection
        assert!(PaymentStatus::admin_can_set(CocPending, CompletedCoc));
        assert!(!PaymentStatus::admin_can_set(Pending, CompletedCoc));
        assert!(!PaymentStatus::admin_can_set(Paid, CompletedCoc));

        // Nothing moves back to the open states
        assert!(!PaymentStatus::admin_can_set(Paid, Pending));
        assert!(!PaymentStatus::admin_can_set(CompletedCoc, CocPending));
    }

    #[test]
    fn test_agent_payment_rules() {
        use PaymentStatus::*;

        assert!(PaymentStatus::agent_can_set(CocPending, CompletedCoc));
        assert!(!PaymentStatus::agent_can_set(Pending, CompletedCoc));
        assert!(!PaymentStatus::agent_can_set(CompletedCoc, CompletedCoc));
        assert!(!PaymentStatus::agent_can_set(CocPending, Paid));
    }

    #[test]
    fn test_crops_normalization_from_text() {
        let crops = CropsInput::Text("Wheat, Maize, Rice".to_string()).normalize();
        assert_eq!(crops, vec!["Wheat", "Maize", "Rice"]);

        let crops = CropsInput::Text("  Tea ,, Rubber ,".to_string()).normalize();
        assert_eq!(crops, vec!["Tea", "Rubber"]);

        assert!(CropsInput::Text("   ".to_string()).normalize().is_empty());
    }

    #[test]
    fn test_crops_normalization_from_list() {
        let crops = CropsInput::List(vec![
            " Paddy ".to_string(),
            "Chili, Onion".to_string(),
            "".to_string(),
        ])
        .normalize();
        assert_eq!(crops, vec!["Paddy", "Chili", "Onion"]);
    }

    #[test]
    fn test_date_parsing() {
        use crate::commands::requests::parse_date_safe;
        use chrono::NaiveDate;

        assert_eq!(
            parse_date_safe("2025-08-01"),
            Some(NaiveDate::from_ymd_opt(2025, 8, 1).unwrap())
        );
        assert_eq!(
            parse_date_safe("20250801"),
            Some(NaiveDate::from_ymd_opt(2025, 8, 1).unwrap())
        );
        assert_eq!(parse_date_safe("invalid"), None);
        assert_eq!(parse_date_safe(""), None);
    }

    #[test]
    fn test_status_wire_strings_round_trip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Scheduled,
            RequestStatus::SampleCollected,
            RequestStatus::InProgress,
            RequestStatus::Completed,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("Assigned"), None);

        for payment in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::CocPending,
            PaymentStatus::CompletedCoc,
        ] {
            assert_eq!(PaymentStatus::parse(payment.as_str()), Some(payment));
        }
        assert_eq!(PaymentStatus::CocPending.as_str(), "COCPending");
        assert_eq!(PaymentStatus::CompletedCoc.as_str(), "CompletedCOC");
    }
}
