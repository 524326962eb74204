//! PDF emission of laid-out pages, A4 with builtin Helvetica.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};

use super::layout::{page_footer, Line, LineKind, Page};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 5.5;
const INDENT_STEP_MM: f32 = 5.0;
const FOOTER_Y_MM: f32 = 12.0;

const TITLE_SIZE: f32 = 20.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 11.0;
const FOOTER_SIZE: f32 = 10.0;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn style(fonts: &Fonts, kind: LineKind) -> (&IndirectFontRef, f32) {
    match kind {
        LineKind::Title => (&fonts.bold, TITLE_SIZE),
        LineKind::Heading => (&fonts.bold, HEADING_SIZE),
        LineKind::Body => (&fonts.regular, BODY_SIZE),
    }
}

pub fn emit(title: &str, pages: &[Page]) -> Result<Vec<u8>, printpdf::Error> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
    };

    let total = pages.len();
    for (index, page) in pages.iter().enumerate() {
        let (page_idx, layer_idx) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content")
        };
        let layer = doc.get_page(page_idx).get_layer(layer_idx);

        let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
        for Line { kind, indent, text } in page {
            if !text.is_empty() {
                let (font, size) = style(&fonts, *kind);
                let x = MARGIN_MM + INDENT_STEP_MM * f32::from(*indent);
                layer.use_text(text.clone(), size, Mm(x), Mm(y), font);
            }
            y -= LINE_HEIGHT_MM;
        }

        layer.use_text(
            page_footer(index, total),
            FOOTER_SIZE,
            Mm(PAGE_WIDTH_MM - MARGIN_MM - 25.0),
            Mm(FOOTER_Y_MM),
            &fonts.regular,
        );
    }

    doc.save_to_bytes()
}
