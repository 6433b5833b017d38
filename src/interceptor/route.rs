//! Route name parsing shared by both interceptor directions.

/// Split `/<service>/<method>` into its two segments.
///
/// Anything else, including empty segments or extra nesting, is not a
/// structured route.
pub fn split_route(route: &str) -> Option<(&str, &str)> {
    let rest = route.strip_prefix('/')?;
    let (service, method) = rest.split_once('/')?;
    if service.is_empty() || method.is_empty() || method.contains('/') {
        return None;
    }
    Some((service, method))
}

/// Service and method labels derived from a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteName {
    pub service: String,
    pub method: String,
}

impl RouteName {
    /// Labels for `route`. Unstructured routes use the raw string for both.
    pub fn parse(route: &str) -> Self {
        match split_route(route) {
            Some((service, method)) => Self {
                service: service.to_string(),
                method: method.to_string(),
            },
            None => Self {
                service: route.to_string(),
                method: route.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_route() {
        let name = RouteName::parse("/billing/Charge");
        assert_eq!(name.service, "billing");
        assert_eq!(name.method, "Charge");
    }

    #[test]
    fn unstructured_route_falls_back_to_raw() {
        let name = RouteName::parse("badroute");
        assert_eq!(name.service, "badroute");
        assert_eq!(name.method, "badroute");
    }

    #[test]
    fn malformed_shapes_are_unstructured() {
        for route in ["", "/", "//", "/billing", "/billing/", "//Charge", "billing/Charge", "/a/b/c"] {
            assert_eq!(split_route(route), None, "route {route:?}");
        }
    }

    #[test]
    fn package_qualified_service() {
        assert_eq!(
            split_route("/shop.billing.v1.Billing/Charge"),
            Some(("shop.billing.v1.Billing", "Charge"))
        );
    }
}
