mod docx;
mod placeholder;
mod render;

pub use docx::{docx_to_html, escape_html, load_template_html, wrap_document};
pub use placeholder::{
    detect_placeholders, long_date_pt_br, PlaceholderKind, PlaceholderReport, RenderContext,
    Subject,
};
pub use render::{html_page, render_document, validate_template};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Client, Lawyer};
    use chrono::NaiveDate;

    fn client() -> Client {
        Client {
            first_name: "Maria".into(),
            last_name: "Souza".into(),
            cpf: "52998224725".into(),
            rg: "123456789".into(),
            nationality: Some("brasileira".into()),
            address: "Rua das Flores".into(),
            address_number: Some("42".into()),
            neighborhood: Some("Centro".into()),
            city: "Campinas".into(),
            state: "SP".into(),
            ..Default::default()
        }
    }

    fn lawyer() -> Lawyer {
        Lawyer {
            name: "Ana Silva".into(),
            oab_number: "SP 123.456".into(),
        }
    }

    fn ctx<'a>(client: &'a Client, lawyer: &'a Lawyer) -> RenderContext<'a> {
        RenderContext {
            client: Some(client),
            lawyer: Some(lawyer),
            today: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        }
    }

    #[test]
    fn classifies_known_and_unknown_tokens() {
        let report =
            detect_placeholders("{nomeCliente} mora em {enderecoCompleto} e gosta de {hobby}");
        assert_eq!(report.valid, vec!["nomeCliente", "enderecoCompleto"]);
        assert_eq!(report.invalid, vec!["hobby"]);
    }

    #[test]
    fn deduplicates_and_ignores_styles() {
        let content = "<style>p { margin: 0 }</style><p>{numeroCPF} {numeroCPF} {x}</p>";
        let report = detect_placeholders(content);
        assert_eq!(report.valid, vec!["numeroCPF"]);
        assert_eq!(report.invalid, vec!["x"]);
        assert_eq!(report.all().len(), 2);
    }

    #[test]
    fn registry_keys_round_trip() {
        for kind in PlaceholderKind::ALL {
            assert_eq!(PlaceholderKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(PlaceholderKind::from_key("nomecliente"), None);
        assert_eq!(PlaceholderKind::NomeAdv.subject(), Subject::Lawyer);
        assert_eq!(PlaceholderKind::DataContrato.subject(), Subject::Document);
    }

    #[test]
    fn renders_every_occurrence() {
        let (c, l) = (client(), lawyer());
        let out = render_document(
            "{nomeCliente}, {nacionalidade}, CPF {numeroCPF}. Assina {nomeAdv} (OAB {numeroOAB}) em {dataContrato}. {nomeCliente}",
            &ctx(&c, &l),
        );
        assert_eq!(
            out,
            "Maria Souza, brasileira, CPF 52998224725. Assina Ana Silva (OAB SP 123.456) em 16 de outubro de 2026. Maria Souza"
        );
    }

    #[test]
    fn full_address_skips_missing_parts() {
        let (mut c, l) = (client(), lawyer());
        assert_eq!(
            render_document("{enderecoCompleto}", &ctx(&c, &l)),
            "Rua das Flores, nº 42, Centro, Campinas, SP"
        );
        c.address_number = None;
        c.neighborhood = None;
        assert_eq!(
            render_document("{enderecoCompleto}", &ctx(&c, &l)),
            "Rua das Flores, Campinas, SP"
        );
    }

    #[test]
    fn missing_data_renders_empty() {
        let empty = RenderContext {
            client: None,
            lawyer: None,
            today: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        };
        assert_eq!(
            render_document("[{nomeCliente}][{estadoCivil}][{nomeAdv}]", &empty),
            "[][][]"
        );

        let c = Client::default();
        let l = Lawyer::default();
        let out = render_document("[{expeditorRG}][{enderecoCompleto}]", &ctx(&c, &l));
        assert_eq!(out, "[][]");
    }

    #[test]
    fn values_are_html_escaped() {
        let (mut c, l) = (client(), lawyer());
        c.last_name = "<Souza & Filhos>".into();
        assert_eq!(
            render_document("<b>{nomeCliente}</b>", &ctx(&c, &l)),
            "<b>Maria &lt;Souza &amp; Filhos&gt;</b>"
        );
    }

    #[test]
    fn braces_next_to_a_token_do_not_hide_it() {
        let (c, l) = (client(), lawyer());
        assert_eq!(
            render_document("{{nomeCliente}} e {x {nomeCliente}", &ctx(&c, &l)),
            "{Maria Souza} e {x Maria Souza"
        );
    }

    #[test]
    fn unknown_tokens_survive_rendering() {
        let (c, l) = (client(), lawyer());
        let out = render_document("{hobby} {nomeCliente}", &ctx(&c, &l));
        assert_eq!(out, "{hobby} Maria Souza");
    }

    #[test]
    fn rendering_leaves_no_registered_tokens() {
        let (c, l) = (client(), lawyer());
        let content: String = PlaceholderKind::ALL
            .iter()
            .map(|k| format!("<p>{{{}}}</p>", k.key()))
            .collect();
        let rendered = render_document(&content, &ctx(&c, &l));
        assert!(detect_placeholders(&rendered).valid.is_empty());
    }

    #[test]
    fn strict_validation() {
        assert_eq!(
            validate_template("{nomeAdv} {dataContrato}").unwrap(),
            vec!["nomeAdv", "dataContrato"]
        );
        match validate_template("{nomeAdv} {foo} {bar}") {
            Err(crate::error::LawdeskError::InvalidPlaceholders(bad)) => {
                assert_eq!(bad, vec!["foo", "bar"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn long_dates_in_portuguese() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(long_date_pt_br(d), "5 de março de 2026");
    }
}
