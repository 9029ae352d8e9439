#[cfg(test)]
mod tests {
    use crate::commands::auth::{register_user_internal, NewUser};
    use crate::commands::lab::submit_recommendation_internal;
    use crate::commands::requests::{
        self, admin_set_payment_internal, create_request_internal, update_status_internal,
        CreateRequestPayload,
    };
    use crate::commands::results::{fetch_result, submit_result_internal, SoilTestSubmission};
    use crate::db::{self, DbPool};
    use crate::workflow::{CropsInput, PaymentStatus, RequestStatus};
    use rust_decimal::Decimal;

    async fn setup_test_db() -> DbPool {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = db::init_pool(&database_url)
            .await
            .expect("Failed to create pool");
        db::init_database(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    async fn seed_user(
        pool: &DbPool,
        role: &'static str,
        email: &str,
        district: Option<&str>,
        employee_prefix: Option<&'static str>,
    ) -> i32 {
        cleanup_user(pool, email).await;
        register_user_internal(
            pool,
            NewUser {
                name: format!("{} (Integration Test)", role),
                email: email.to_string(),
                password: "secret123".to_string(),
                role,
                phone: Some("0770000000".to_string()),
                district: district.map(|d| d.to_string()),
                address: Some("Test Lane, Kandy".to_string()),
                nic: Some("900000000V".to_string()),
                registration_no: None,
                employee_prefix,
            },
        )
        .await
        .expect("Failed to seed user")
    }

    async fn cleanup_user(pool: &DbPool, email: &str) {
        let ids: Vec<(i32,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_all(pool)
            .await
            .unwrap_or_default();
        for (id,) in ids {
            let _ = sqlx::query(
                "DELETE FROM soil_test_results WHERE request_id IN
                    (SELECT request_id FROM soil_test_requests WHERE farmer_id = $1)",
            )
            .bind(id)
            .execute(pool)
            .await;
            let _ = sqlx::query("DELETE FROM soil_test_requests WHERE farmer_id = $1")
                .bind(id)
                .execute(pool)
                .await;
            let _ = sqlx::query(
                "UPDATE soil_test_requests SET agent_id = NULL WHERE agent_id = $1",
            )
            .bind(id)
            .execute(pool)
            .await;
            let _ = sqlx::query(
                "UPDATE soil_test_requests SET recommender_id = NULL WHERE recommender_id = $1",
            )
            .bind(id)
            .execute(pool)
            .await;
            let _ = sqlx::query(
                "UPDATE soil_test_results SET recommended_by = NULL WHERE recommended_by = $1",
            )
            .bind(id)
            .execute(pool)
            .await;
            let _ = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await;
        }
    }

    fn cash_request_payload() -> CreateRequestPayload {
        CreateRequestPayload {
            phone: "0771234567".to_string(),
            preferred_date: "2026-09-01".to_string(),
            preferred_time: "8:00 AM - 9:00 AM".to_string(),
            district: "Kandy".to_string(),
            address: "12 Paddy Field Road, Kandy".to_string(),
            land_size: Decimal::from(6000),
            land_unit: "sqft".to_string(),
            crops: Some(CropsInput::Text("Tea, Rubber".to_string())),
            payment_method: "cash".to_string(),
        }
    }

    fn soil_test_submission(collect_cash: bool) -> SoilTestSubmission {
        SoilTestSubmission {
            ph: 6.5,
            sunlight: "Full Sun".to_string(),
            moisture: 42.0,
            soil_moisture: 37.5,
            conductivity: 1.2,
            woil: 0.8,
            other: Some("Slightly sandy topsoil".to_string()),
            collect_cash,
        }
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a local postgres"]
    async fn test_cash_request_lifecycle_integration() {
        let pool = setup_test_db().await;

        let farmer_id = seed_user(&pool, "Farmer", "it-farmer@sarubima.test", None, None).await;
        let agent_id =
            seed_user(&pool, "Agent", "it-agent@sarubima.test", Some("Kandy"), Some("AG")).await;
        let lab_id = seed_user(&pool, "Lab", "it-lab@sarubima.test", Some("Kandy"), Some("LB")).await;

        // 1. Farmer submits a 6000 sqft cash request
        let request_id = create_request_internal(&pool, farmer_id, cash_request_payload())
            .await
            .expect("create_request_internal failed");

        let request = requests::fetch_request(&pool, &request_id).await.unwrap();
        assert_eq!(request.number_of_tests, 2);
        assert_eq!(request.total_cost, 3700);
        assert_eq!(request.status, "Pending");
        assert_eq!(request.payment_status, "COCPending");
        assert_eq!(request.crops, vec!["Tea", "Rubber"]);

        // 2. The COC gate blocks submission until cash is confirmed
        let blocked =
            submit_result_internal(&pool, agent_id, &request_id, soil_test_submission(false), false)
                .await;
        assert!(blocked.is_err(), "COC gate did not block the submission");

        let no_result: Option<(String,)> =
            sqlx::query_as("SELECT request_id FROM soil_test_results WHERE request_id = $1")
                .bind(&request_id)
                .fetch_optional(&pool)
                .await
                .unwrap();
        assert!(no_result.is_none(), "Result row written despite COC gate");

        // 3. The same payload with the confirmation lands atomically
        submit_result_internal(&pool, agent_id, &request_id, soil_test_submission(true), false)
            .await
            .expect("submission with cash confirmation failed");

        let request = requests::fetch_request(&pool, &request_id).await.unwrap();
        assert_eq!(request.status, "Sample Collected");
        assert_eq!(request.payment_status, "CompletedCOC");
        assert_eq!(request.agent_id, Some(agent_id));

        // 4. Lab recommendation completes the request and splits the crops
        submit_recommendation_internal(
            &pool,
            lab_id,
            &request_id,
            CropsInput::Text("Wheat, Maize, Rice".to_string()).normalize(),
            None,
        )
        .await
        .expect("recommendation failed");

        let request = requests::fetch_request(&pool, &request_id).await.unwrap();
        assert_eq!(request.status, "Completed");

        let result = fetch_result(&pool, &request_id).await.unwrap();
        assert_eq!(
            result.recommended_crops,
            Some(vec![
                "Wheat".to_string(),
                "Maize".to_string(),
                "Rice".to_string()
            ])
        );
        assert_eq!(result.recommended_by, Some(lab_id));

        // 5. Terminal states are absorbing
        let reopened =
            update_status_internal(&pool, &request_id, RequestStatus::InProgress).await;
        assert!(reopened.is_err(), "Completed request accepted a transition");

        cleanup_user(&pool, "it-farmer@sarubima.test").await;
        cleanup_user(&pool, "it-agent@sarubima.test").await;
        cleanup_user(&pool, "it-lab@sarubima.test").await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a local postgres"]
    async fn test_admin_transitions_integration() {
        let pool = setup_test_db().await;

        let farmer_id = seed_user(&pool, "Farmer", "it-farmer2@sarubima.test", None, None).await;

        let mut payload = cash_request_payload();
        payload.payment_method = "card".to_string();
        let request_id = create_request_internal(&pool, farmer_id, payload)
            .await
            .unwrap();

        // Card requests never enter COCPending
        let request = requests::fetch_request(&pool, &request_id).await.unwrap();
        assert_eq!(request.payment_status, "Pending");

        // Forward steps pass, backward steps fail
        update_status_internal(&pool, &request_id, RequestStatus::Scheduled)
            .await
            .unwrap();
        let backward = update_status_internal(&pool, &request_id, RequestStatus::Pending).await;
        assert!(backward.is_err());

        // Admin can mark the card payment as settled
        admin_set_payment_internal(&pool, &request_id, PaymentStatus::Paid)
            .await
            .unwrap();
        let coc = admin_set_payment_internal(&pool, &request_id, PaymentStatus::CompletedCoc).await;
        assert!(coc.is_err(), "CompletedCOC reachable without COCPending");

        // Cancellation is terminal
        update_status_internal(&pool, &request_id, RequestStatus::Cancelled)
            .await
            .unwrap();
        let revived = update_status_internal(&pool, &request_id, RequestStatus::Scheduled).await;
        assert!(revived.is_err());

        cleanup_user(&pool, "it-farmer2@sarubima.test").await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a local postgres"]
    async fn test_hold_gates_assignment_lists_integration() {
        let pool = setup_test_db().await;

        let agent_id = seed_user(
            &pool,
            "Agent",
            "it-held-agent@sarubima.test",
            Some("Galle"),
            Some("AG"),
        )
        .await;

        let listed = requests::list_candidates(&pool, "Agent", Some("Galle".to_string()))
            .await
            .unwrap();
        assert!(listed.iter().any(|u| u.id == agent_id));

        crate::commands::admin::set_user_hold_internal(&pool, agent_id, false)
            .await
            .unwrap();
        let listed = requests::list_candidates(&pool, "Agent", Some("Galle".to_string()))
            .await
            .unwrap();
        assert!(!listed.iter().any(|u| u.id == agent_id));

        crate::commands::admin::set_user_hold_internal(&pool, agent_id, true)
            .await
            .unwrap();
        let listed = requests::list_candidates(&pool, "Agent", Some("Galle".to_string()))
            .await
            .unwrap();
        assert!(listed.iter().any(|u| u.id == agent_id));

        cleanup_user(&pool, "it-held-agent@sarubima.test").await;
    }
}
