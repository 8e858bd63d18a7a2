use crate::error::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

/// Plexus component descriptor; one per jar, merged into one
pub const REGISTRY_PATH: &str = "META-INF/plexus/components.xml";

const ROOT: &str = "component-set";
const COMPONENTS: &str = "components";

/// Accumulated `<components>` content of every merged descriptor
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    events: Vec<Event<'static>>,
    components: usize,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the children of every `<components>` element in `xml`
    pub fn merge(&mut self, xml: &[u8], origin: &str) -> Result<()> {
        let fail = |message: String| Error::Registry {
            path: format!("{}!{}", origin, REGISTRY_PATH),
            message,
        };
        let text = std::str::from_utf8(xml).map_err(|e| fail(e.to_string()))?;
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut depth = 0usize;
        let mut seen_root = false;
        loop {
            let event = reader
                .read_event()
                .map_err(|e| fail(format!("at byte {}: {}", reader.buffer_position(), e)))?;
            match event {
                Event::Eof => break,
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    let empty = matches!(event, Event::Empty(_));
                    match depth {
                        0 => {
                            if name != ROOT || seen_root {
                                return Err(fail(format!("expected {}", ROOT)));
                            }
                            seen_root = true;
                        }
                        1 => {
                            if name != COMPONENTS {
                                return Err(fail(format!("unknown element: {}", name)));
                            }
                        }
                        _ => {
                            if depth == 2 {
                                self.components += 1;
                            }
                            self.events.push(event.clone().into_owned());
                        }
                    }
                    if !empty {
                        depth += 1;
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth >= 2 {
                        self.events.push(event.into_owned());
                    }
                }
                Event::Text(_) | Event::CData(_) | Event::Comment(_) if depth >= 2 => {
                    self.events.push(event.into_owned());
                }
                _ => {}
            }
        }

        if !seen_root {
            return Err(fail(format!("expected {}", ROOT)));
        }
        debug!("merged component registry from {}", origin);
        Ok(())
    }

    /// Number of component elements collected so far
    pub fn len(&self) -> usize {
        self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components == 0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let fail = |e: quick_xml::Error| Error::Registry {
            path: REGISTRY_PATH.to_string(),
            message: e.to_string(),
        };
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(fail)?;
        writer.write_event(Event::Start(BytesStart::new(ROOT))).map_err(fail)?;
        writer.write_event(Event::Start(BytesStart::new(COMPONENTS))).map_err(fail)?;
        for event in &self.events {
            writer.write_event(event).map_err(fail)?;
        }
        writer.write_event(Event::End(BytesEnd::new(COMPONENTS))).map_err(fail)?;
        writer.write_event(Event::End(BytesEnd::new(ROOT))).map_err(fail)?;
        Ok(writer.into_inner())
    }
}
