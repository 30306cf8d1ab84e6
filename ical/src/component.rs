// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! iCalendar component and property types (RFC 5545 §3.4-3.6).

use std::fmt;

/// Component kind for iCalendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// VCALENDAR wrapper component.
    Calendar,
    /// VEVENT component.
    Event,
    /// VTODO component.
    Todo,
    /// VJOURNAL component.
    Journal,
    /// VFREEBUSY component.
    FreeBusy,
    /// VTIMEZONE component.
    Timezone,
    /// VALARM component, nested within VEVENT/VTODO.
    Alarm,
    /// STANDARD sub-component of VTIMEZONE.
    Standard,
    /// DAYLIGHT sub-component of VTIMEZONE.
    Daylight,
    /// Unknown or X- component.
    Unknown,
}

impl ComponentKind {
    /// Returns the canonical name for this component kind.
    ///
    /// `Unknown` has no canonical name; the original name is preserved on
    /// the [`Component`] itself.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calendar => "VCALENDAR",
            Self::Event => "VEVENT",
            Self::Todo => "VTODO",
            Self::Journal => "VJOURNAL",
            Self::FreeBusy => "VFREEBUSY",
            Self::Timezone => "VTIMEZONE",
            Self::Alarm => "VALARM",
            Self::Standard => "STANDARD",
            Self::Daylight => "DAYLIGHT",
            Self::Unknown => "X-UNKNOWN",
        }
    }

    /// Parses a component kind from a name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "VCALENDAR" => Self::Calendar,
            "VEVENT" => Self::Event,
            "VTODO" => Self::Todo,
            "VJOURNAL" => Self::Journal,
            "VFREEBUSY" => Self::FreeBusy,
            "VTIMEZONE" => Self::Timezone,
            "VALARM" => Self::Alarm,
            "STANDARD" => Self::Standard,
            "DAYLIGHT" => Self::Daylight,
            _ => Self::Unknown,
        }
    }

    /// Returns whether this is a schedulable component (VEVENT, VTODO, VJOURNAL).
    #[must_use]
    pub const fn is_schedulable(self) -> bool {
        matches!(self, Self::Event | Self::Todo | Self::Journal)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single iCalendar property: name, parameters and wire-form value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name, upper-cased.
    pub name: String,
    /// Parameters in order of appearance, names upper-cased.
    pub params: Vec<(String, String)>,
    /// Raw property value, unescaped only of line folding.
    pub value: String,
}

impl Property {
    /// Creates a parameterless property.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    /// Adds a parameter, builder style.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .push((name.into().to_ascii_uppercase(), value.into()));
        self
    }

    /// Returns the first parameter with the given name (case-insensitive).
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        let upper = name.to_ascii_uppercase();
        self.params
            .iter()
            .find(|(n, _)| *n == upper)
            .map(|(_, v)| v.as_str())
    }
}

/// An iCalendar component.
///
/// Components carry properties in order of appearance and may nest other
/// components (a VCALENDAR contains VEVENTs, which may contain VALARMs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Component kind.
    pub kind: ComponentKind,
    /// Original component name, preserved for X- components.
    pub name: String,
    /// Properties in order of appearance.
    pub properties: Vec<Property>,
    /// Nested sub-components.
    pub children: Vec<Component>,
}

impl Component {
    /// Creates an empty component of the given kind.
    #[must_use]
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            name: kind.as_str().to_string(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates a component with a custom name (for X- components).
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        let name = name.into().to_ascii_uppercase();
        Self {
            kind: ComponentKind::parse(&name),
            name,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an empty VCALENDAR with VERSION and PRODID set.
    #[must_use]
    pub fn calendar(prodid: impl Into<String>) -> Self {
        let mut root = Self::new(ComponentKind::Calendar);
        root.add_property(Property::new("VERSION", "2.0"));
        root.add_property(Property::new("PRODID", prodid.into()));
        root
    }

    /// Appends a property.
    pub fn add_property(&mut self, prop: Property) {
        self.properties.push(prop);
    }

    /// Appends a child component.
    pub fn add_child(&mut self, child: Component) {
        self.children.push(child);
    }

    /// Returns the first property with the given name.
    #[must_use]
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        let upper = name.to_ascii_uppercase();
        self.properties.iter().find(|p| p.name == upper)
    }

    /// Returns all properties with the given name.
    #[must_use]
    pub fn properties_named(&self, name: &str) -> Vec<&Property> {
        let upper = name.to_ascii_uppercase();
        self.properties.iter().filter(|p| p.name == upper).collect()
    }

    /// Returns the value of the first property with the given name.
    #[must_use]
    pub fn property_value(&self, name: &str) -> Option<&str> {
        self.get_property(name).map(|p| p.value.as_str())
    }

    /// Returns whether a property with the given name is present.
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.get_property(name).is_some()
    }

    /// Returns whether any of the given property names is present.
    #[must_use]
    pub fn has_any_property(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has_property(n))
    }

    /// Replaces every property with the given name by a single new one, or
    /// appends it when absent.
    pub fn set_property(&mut self, prop: Property) {
        self.remove_properties(&[&prop.name]);
        self.properties.push(prop);
    }

    /// Removes every property whose name appears in `names`.
    pub fn remove_properties(&mut self, names: &[&str]) {
        let uppers: Vec<String> = names.iter().map(|n| n.to_ascii_uppercase()).collect();
        self.properties.retain(|p| !uppers.contains(&p.name));
    }

    /// Returns the UID property value if present.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.property_value("UID")
    }

    /// Returns children of a specific kind.
    #[must_use]
    pub fn children_of_kind(&self, kind: ComponentKind) -> Vec<&Component> {
        self.children.iter().filter(|c| c.kind == kind).collect()
    }

    /// Returns all VTIMEZONE children.
    #[must_use]
    pub fn timezones(&self) -> Vec<&Component> {
        self.children_of_kind(ComponentKind::Timezone)
    }

    /// Returns all schedulable children (VEVENT, VTODO, VJOURNAL) in order
    /// of appearance.
    #[must_use]
    pub fn schedulables(&self) -> Vec<&Component> {
        self.children
            .iter()
            .filter(|c| c.kind.is_schedulable())
            .collect()
    }

    /// Returns the first schedulable child, typically the recurrence master.
    #[must_use]
    pub fn first_schedulable(&self) -> Option<&Component> {
        self.children.iter().find(|c| c.kind.is_schedulable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_kind_parse() {
        assert_eq!(ComponentKind::parse("VEVENT"), ComponentKind::Event);
        assert_eq!(ComponentKind::parse("vtodo"), ComponentKind::Todo);
        assert_eq!(ComponentKind::parse("X-CUSTOM"), ComponentKind::Unknown);
    }

    #[test]
    fn property_lookup_is_case_insensitive() {
        let mut event = Component::new(ComponentKind::Event);
        event.add_property(Property::new("UID", "uid-1"));
        event.add_property(Property::new("SUMMARY", "Dentist"));

        assert_eq!(event.property_value("uid"), Some("uid-1"));
        assert_eq!(event.uid(), Some("uid-1"));
        assert!(event.has_any_property(&["RRULE", "summary"]));
    }

    #[test]
    fn set_property_replaces_all_occurrences() {
        let mut todo = Component::new(ComponentKind::Todo);
        todo.add_property(Property::new("CATEGORIES", "home"));
        todo.add_property(Property::new("CATEGORIES", "chores"));
        todo.set_property(Property::new("CATEGORIES", "errands"));

        assert_eq!(todo.properties_named("CATEGORIES").len(), 1);
        assert_eq!(todo.property_value("CATEGORIES"), Some("errands"));
    }

    #[test]
    fn schedulables_preserve_order() {
        let mut cal = Component::calendar("-//test//EN");
        let mut tz = Component::new(ComponentKind::Timezone);
        tz.add_property(Property::new("TZID", "Europe/Oslo"));
        cal.add_child(tz);

        let mut master = Component::new(ComponentKind::Event);
        master.add_property(Property::new("UID", "e1"));
        cal.add_child(master);

        let mut exception = Component::new(ComponentKind::Event);
        exception.add_property(Property::new("UID", "e1"));
        exception.add_property(Property::new("RECURRENCE-ID", "20260102T100000Z"));
        cal.add_child(exception);

        assert_eq!(cal.schedulables().len(), 2);
        assert_eq!(cal.timezones().len(), 1);
        assert!(cal.first_schedulable().is_some_and(|c| !c
            .has_property("RECURRENCE-ID")));
    }
}
