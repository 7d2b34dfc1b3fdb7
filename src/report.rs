//! Debug report collection.
//!
//! When the `debug-report` option is set, pipeline stages append titled
//! code sections here; the host renders the collected report after the run.

/// One titled section of the debug report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub id: String,
    pub title: String,
    pub body: String,
}

/// Accumulates report sections in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DebugReport {
    sections: Vec<ReportSection>,
}

impl DebugReport {
    pub fn new() -> Self {
        DebugReport::default()
    }

    pub fn add_code_section(
        &mut self,
        id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) {
        self.sections.push(ReportSection {
            id: id.into(),
            title: title.into(),
            body: body.into(),
        });
    }

    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_keep_insertion_order() {
        let mut report = DebugReport::new();
        report.add_code_section("a", "A", "first");
        report.add_code_section("b", "B", "second");
        assert_eq!(report.sections()[0].id, "a");
        assert_eq!(report.sections()[1].body, "second");
    }
}
