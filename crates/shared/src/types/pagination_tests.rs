use super::*;

#[test]
fn test_page_request_default() {
    let request = PageRequest::default();
    assert_eq!(request.page, 1);
    assert_eq!(request.per_page, 20);
}

#[test]
fn test_page_request_offset() {
    assert_eq!(PageRequest::new(1, 20).offset(), 0);
    assert_eq!(PageRequest::new(2, 20).offset(), 20);
    assert_eq!(PageRequest::new(3, 50).offset(), 100);
}

#[test]
fn test_page_request_clamps() {
    let request = PageRequest::new(0, 1_000);
    assert_eq!(request.page, 1);
    assert_eq!(request.per_page, MAX_PER_PAGE);
    assert_eq!(PageRequest::new(1, 0).limit(), 1);
}

#[test]
fn test_page_response_new() {
    let data = vec![1, 2, 3];
    let response = PageResponse::new(data.clone(), 1, 10, 3);

    assert_eq!(response.data, data);
    assert_eq!(response.meta.total, 3);
    assert_eq!(response.meta.total_pages, 1);
}

#[test]
fn test_page_response_total_pages_rounds_up() {
    let response = PageResponse::new(vec![0; 10], 1, 10, 21);
    assert_eq!(response.meta.total_pages, 3);

    let response = PageResponse::new(vec![0; 10], 1, 10, 20);
    assert_eq!(response.meta.total_pages, 2);
}

#[test]
fn test_page_response_empty() {
    let response: PageResponse<i32> = PageResponse::new(vec![], 1, 10, 0);
    assert_eq!(response.meta.total_pages, 1);
}

#[test]
fn test_page_response_map() {
    let response = PageResponse::new(vec![1, 2], 2, 2, 4).map(|n| n * 10);
    assert_eq!(response.data, vec![10, 20]);
    assert_eq!(response.meta.page, 2);
}
