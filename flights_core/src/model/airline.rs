use crate::model::AirlineCode;

#[derive(Debug, Clone, PartialEq)]
pub struct Airline {
    code: AirlineCode,
    pub name: Option<String>,
}

impl Airline {
    pub fn stub(code: AirlineCode) -> Self {
        Self { code, name: None }
    }

    pub fn code(&self) -> &AirlineCode {
        &self.code
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}
