#[cfg(test)]
mod tests {
    use crate::db::{
        ApplicantFilter, create_specialty, find_applicants, get_all_specialties, get_dashboard,
        get_or_init_news, insert_contract, save_news, search,
    };
    use crate::error::AppError;
    use crate::forms::{ContractData, SpecialtyData};
    use crate::models::{ClassOfEntry, PaymentForm, SearchResult};
    use chrono::NaiveDate;
    use crate::test::test_utils::{TestDb, TestDbBuilder, create_standard_test_db};

    fn specialty(name: &str, code: Option<&str>) -> SpecialtyData {
        SpecialtyData {
            name: name.to_string(),
            code: code.map(String::from),
            description: String::new(),
        }
    }

    async fn add_contract(test_db: &TestDb, number: &str, fio: &str, date: &str) -> i64 {
        let data = ContractData {
            number: number.to_string(),
            date_of_conclusion: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("valid date"),
            payment_form: PaymentForm::Yearly,
            maternity_capital: false,
            credit: false,
            applicant_id: test_db.applicant_id(fio).expect("Applicant should exist"),
            customer_id: None,
        };
        insert_contract(&test_db.pool, &data)
            .await
            .expect("Failed to insert contract")
    }

    #[rocket::async_test]
    async fn test_specialties_are_listed_by_name() {
        let test_db = create_standard_test_db().await;

        let specialties = get_all_specialties(&test_db.pool)
            .await
            .expect("Failed to list specialties");

        let names: Vec<&str> = specialties.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Информационные системы",
                "Программирование в компьютерных системах"
            ]
        );
    }

    #[rocket::async_test]
    async fn test_duplicate_specialty_is_a_conflict() {
        let test_db = create_standard_test_db().await;

        let err = create_specialty(&test_db.pool, &specialty("Информационные системы", None))
            .await
            .expect_err("Duplicate name should be rejected");
        assert!(matches!(err, AppError::Conflict { ref field, .. } if field == "name"));

        let err = create_specialty(&test_db.pool, &specialty("Сетевое администрирование", Some("09.02.07")))
            .await
            .expect_err("Duplicate code should be rejected");
        assert!(matches!(err, AppError::Conflict { ref field, .. } if field == "code"));

        // Specialties without a code do not collide with each other.
        create_specialty(&test_db.pool, &specialty("Экономика", None))
            .await
            .expect("Failed to create specialty without code");
        create_specialty(&test_db.pool, &specialty("Право", None))
            .await
            .expect("Failed to create second specialty without code");
    }

    #[rocket::async_test]
    async fn test_find_applicants_filters_and_pages() {
        let test_db = TestDbBuilder::new()
            .applicant("Иванов Иван")
            .applicant("Иванова Анна")
            .applicant("Петров Пётр")
            .build()
            .await
            .expect("Failed to build test database");

        sqlx::query("UPDATE applicants SET class_of_entry = '11' WHERE id = ?")
            .bind(test_db.applicant_id("Петров Пётр"))
            .execute(&test_db.pool)
            .await
            .expect("Failed to update class");

        let filter = ApplicantFilter {
            fio: Some("иванов".to_string()),
            ..Default::default()
        };
        let page = find_applicants(&test_db.pool, &filter, 1, 10)
            .await
            .expect("Failed to find applicants");
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|a| a.fio.starts_with("Иванов")));

        let filter = ApplicantFilter {
            class_of_entry: Some(ClassOfEntry::Eleventh),
            ..Default::default()
        };
        let page = find_applicants(&test_db.pool, &filter, 1, 10)
            .await
            .expect("Failed to find applicants");
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].fio, "Петров Пётр");

        let page = find_applicants(&test_db.pool, &ApplicantFilter::default(), 2, 2)
            .await
            .expect("Failed to find applicants");
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.page, 2);
        assert_eq!(page.items.len(), 1);

        // Out-of-range pages clamp to the last one.
        let page = find_applicants(&test_db.pool, &ApplicantFilter::default(), 9, 2)
            .await
            .expect("Failed to find applicants");
        assert_eq!(page.page, 2);
    }

    #[rocket::async_test]
    async fn test_news_is_a_single_row() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");

        let news = get_or_init_news(&test_db.pool)
            .await
            .expect("Failed to get news");
        assert_eq!(news.id, 1);
        assert_eq!(news.content, "");

        let news = save_news(&test_db.pool, "  Приём документов открыт  ")
            .await
            .expect("Failed to save news");
        assert_eq!(news.content, "Приём документов открыт");

        save_news(&test_db.pool, "Приём продлён")
            .await
            .expect("Failed to save news");
        assert_eq!(test_db.count("news").await, 1);
    }

    #[rocket::async_test]
    async fn test_fio_filter_takes_wildcards_literally() {
        let test_db = TestDbBuilder::new()
            .applicant("Иванов Иван")
            .applicant("Смит_Джон")
            .build()
            .await
            .expect("Failed to build test database");

        for (needle, expected) in [("%", 0), ("_", 1), ("ИВАН", 1), ("смит_", 1)] {
            let filter = ApplicantFilter {
                fio: Some(needle.to_string()),
                ..Default::default()
            };
            let page = find_applicants(&test_db.pool, &filter, 1, 10)
                .await
                .expect("Failed to find applicants");
            assert_eq!(page.total, expected, "needle {:?}", needle);
        }
    }

    #[rocket::async_test]
    async fn test_dashboard_summary() {
        let mut builder = TestDbBuilder::new();
        for n in 0..12 {
            builder = builder.applicant(&format!("Абитуриент {:02}", n));
        }
        let test_db = builder.build().await.expect("Failed to build test database");

        add_contract(&test_db, "Д-001", "Абитуриент 00", "2024-07-01").await;
        let latest = add_contract(&test_db, "Д-002", "Абитуриент 01", "2024-08-15").await;

        let dashboard = get_dashboard(&test_db.pool)
            .await
            .expect("Failed to build dashboard");

        assert_eq!(dashboard.applicant_count, 12);
        assert_eq!(dashboard.contract_count, 2);
        assert_eq!(dashboard.recent_applicants.len(), 10);
        assert_eq!(dashboard.recent_applicants[0].fio, "Абитуриент 11");
        assert_eq!(dashboard.recent_contracts.len(), 2);
        assert_eq!(dashboard.recent_contracts[0].id, latest);
    }

    #[rocket::async_test]
    async fn test_search_applicants_and_contracts() {
        let mut builder = TestDbBuilder::new()
            .applicant("Иванов Иван")
            .applicant("Иванова Анна")
            .applicant("Петров Пётр");
        for n in 0..4 {
            builder = builder.applicant(&format!("Сидоров {}", n));
        }
        let test_db = builder.build().await.expect("Failed to build test database");

        let ivanov_contract = add_contract(&test_db, "Д-100", "Иванов Иван", "2024-07-01").await;
        let petrov_contract = add_contract(&test_db, "Д-200", "Петров Пётр", "2024-07-02").await;

        let results = search(&test_db.pool, "  ИВАНОВ ")
            .await
            .expect("Failed to search");
        let applicants: Vec<&SearchResult> = results
            .iter()
            .filter(|r| matches!(r, SearchResult::Applicant { .. }))
            .collect();
        assert_eq!(applicants.len(), 2);
        assert!(results.contains(&SearchResult::Contract {
            id: ivanov_contract,
            number: "Д-100".to_string(),
            applicant_fio: "Иванов Иван".to_string(),
        }));

        let results = search(&test_db.pool, "Д-2").await.expect("Failed to search");
        assert_eq!(
            results,
            vec![SearchResult::Contract {
                id: petrov_contract,
                number: "Д-200".to_string(),
                applicant_fio: "Петров Пётр".to_string(),
            }]
        );

        // Every applicant shares the phone; results are capped.
        let results = search(&test_db.pool, "1234567").await.expect("Failed to search");
        assert_eq!(results.len(), 5);

        assert!(search(&test_db.pool, "   ").await.expect("Failed to search").is_empty());
    }
}
