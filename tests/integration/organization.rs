//! Organizational unit listing.

use crate::common::corp_service;

#[tokio::test]
async fn test_lists_every_unit_under_the_root() {
    let (_, _, service) = corp_service();

    let units = service.get_organization_structure().await;

    let names: Vec<_> = units.iter().filter_map(|u| u.name.as_deref()).collect();
    assert_eq!(names, vec!["Eng", "Sales", "Legal"]);
    assert_eq!(units[0].description.as_deref(), Some("Engineering"));
    assert_eq!(units[0].path.as_deref(), Some("OU=Eng,DC=corp"));
    assert_eq!(units[1].description, None);
}

#[tokio::test]
async fn test_failure_yields_empty_list() {
    let (directory, _, service) = corp_service();
    directory.fail_searches(true);

    assert!(service.get_organization_structure().await.is_empty());

    directory.fail_searches(false);
    assert_eq!(service.get_organization_structure().await.len(), 3);
}
