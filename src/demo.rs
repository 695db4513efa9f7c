/// Clearly-marked synthetic transcripts for when captions cannot be retrieved
use crate::chapters::{
    AssemblyConfig, BreakCandidate, BreakDetector, Chapter, ChapterAssembler, DetectionConfig,
};
use crate::language::Language;
use crate::transcript::{Timeline, TranscriptData, TranscriptResult, TranscriptSource, Word};
use tracing::info;

/// Seconds per synthetic word
pub const DEMO_WORD_SECONDS: f64 = 0.6;
/// Extra pause between synthetic sentences
pub const DEMO_SENTENCE_PAUSE: f64 = 1.0;
/// Confidence of synthetic words
pub const DEMO_CONFIDENCE: f64 = 0.95;

fn demo_sentences(language: Language) -> &'static [&'static str] {
    match language {
        Language::English => &[
            "Hello everyone and welcome back to the channel.",
            "This is demo content generated because captions could not be loaded for this video.",
            "Today we are going to walk through the topic step by step so it is easy to follow.",
            "First, let's look at the background and why this subject matters in practice.",
            "Many people run into the same problems when they start, and that is completely normal.",
            "We will keep the explanations short and focus on what you can actually use.",
            "Now, let's move into the main part of the discussion and look at the details.",
            "The most important idea is to break a large problem into small and manageable pieces.",
            "Each piece can then be tested on its own before everything is put together again.",
            "Next, we will go through a few practical examples that show this approach in action.",
            "In the first example we start with a simple setup and improve it one change at a time.",
            "In the second example we compare two different approaches and measure the results.",
            "Additionally, keep in mind that small mistakes early on can become expensive later.",
            "Taking notes while you work makes it much easier to repeat what went well.",
            "Finally, let's summarize the key takeaways from everything we covered today.",
            "Break problems down, test each part, and review your results regularly.",
            "Thank you for watching, and see you in the next video.",
        ],
        Language::Spanish => &[
            "Hola a todos y bienvenidos de nuevo al canal.",
            "Este es contenido de demostración porque no se pudieron cargar los subtítulos de este video.",
            "Hoy vamos a recorrer el tema paso a paso para que sea fácil de seguir.",
            "Primero, veamos el contexto y por qué este tema es importante en la práctica.",
            "Ahora pasamos a la parte principal y revisamos los detalles más importantes.",
            "La idea clave es dividir un problema grande en partes pequeñas y manejables.",
            "Siguiente, veremos algunos ejemplos prácticos que muestran este enfoque.",
            "Además, recuerda que los pequeños errores al principio pueden costar caro después.",
            "Finalmente, resumimos las ideas principales de todo lo que vimos hoy.",
            "Gracias por ver el video y nos vemos en el próximo.",
        ],
        Language::Portuguese => &[
            "Olá a todos e bem-vindos de volta ao canal.",
            "Este é um conteúdo de demonstração porque as legendas deste vídeo não puderam ser carregadas.",
            "Hoje vamos percorrer o tema passo a passo para que seja fácil de acompanhar.",
            "Primeiro, vamos ver o contexto e por que este assunto importa na prática.",
            "Agora entramos na parte principal e analisamos os detalhes mais importantes.",
            "A ideia central é dividir um problema grande em partes pequenas e gerenciáveis.",
            "Além disso, veremos alguns exemplos práticos que mostram essa abordagem.",
            "Finalmente, vamos resumir os pontos principais de tudo o que vimos hoje.",
            "Obrigado por assistir e até o próximo vídeo.",
        ],
        Language::French => &[
            "Bonjour à tous et bienvenue sur la chaîne.",
            "Ceci est un contenu de démonstration car les sous-titres de cette vidéo n'ont pas pu être chargés.",
            "Aujourd'hui nous allons parcourir le sujet étape par étape.",
            "Premièrement, regardons le contexte et pourquoi ce sujet est important.",
            "Maintenant, passons à la partie principale et aux détails essentiels.",
            "L'idée clé est de découper un grand problème en petites parties simples.",
            "Ensuite, nous verrons quelques exemples pratiques de cette approche.",
            "Enfin, résumons les points clés de tout ce que nous avons vu aujourd'hui.",
            "Merci de votre attention et à bientôt pour la prochaine vidéo.",
        ],
        Language::German => &[
            "Hallo zusammen und willkommen zurück auf dem Kanal.",
            "Dies sind Demo-Inhalte, weil die Untertitel für dieses Video nicht geladen werden konnten.",
            "Heute gehen wir das Thema Schritt für Schritt durch.",
            "Erstens schauen wir uns den Hintergrund an und warum das Thema wichtig ist.",
            "Jetzt kommen wir zum Hauptteil und betrachten die wichtigsten Details.",
            "Die zentrale Idee ist, ein großes Problem in kleine Teile zu zerlegen.",
            "Außerdem sehen wir uns einige praktische Beispiele für diesen Ansatz an.",
            "Schließlich fassen wir die wichtigsten Punkte von heute zusammen.",
            "Danke fürs Zuschauen und bis zum nächsten Video.",
        ],
        Language::Korean => &[
            "안녕하세요 여러분 채널에 다시 오신 것을 환영합니다.",
            "이 영상의 자막을 불러올 수 없어서 생성된 데모 콘텐츠입니다.",
            "오늘은 주제를 단계별로 쉽게 살펴보겠습니다.",
            "먼저 배경과 이 주제가 왜 중요한지 알아보겠습니다.",
            "이제 본론으로 들어가서 중요한 내용을 자세히 보겠습니다.",
            "핵심은 큰 문제를 작고 다루기 쉬운 부분으로 나누는 것입니다.",
            "다음으로 이 방법을 보여주는 실제 예시를 살펴보겠습니다.",
            "마지막으로 오늘 다룬 내용을 요약해 보겠습니다.",
            "시청해 주셔서 감사합니다 다음 영상에서 뵙겠습니다.",
        ],
        Language::Japanese => &[
            "皆さん こんにちは チャンネルへようこそ。",
            "この動画の字幕を読み込めなかったため これはデモ用のコンテンツです。",
            "今日は テーマを 順番に 分かりやすく 説明します。",
            "まず 背景と このテーマが 重要な 理由を 見ていきます。",
            "次に 本題に入り 重要な ポイントを 詳しく 見ていきます。",
            "大きな 問題を 小さな 部分に 分けることが 大切です。",
            "さらに 実際の 例を いくつか 紹介します。",
            "最後に 今日の 内容を まとめます。",
            "ご視聴 ありがとうございました。",
        ],
    }
}

/// Synthetic timeline: 0.6s per word, one extra second between sentences
pub fn demo_timeline(language: Language) -> Timeline {
    let mut words = Vec::new();
    let mut cursor = 0.0;

    for sentence in demo_sentences(language) {
        for token in sentence.split_whitespace() {
            words.push(Word::new(token, cursor, cursor + DEMO_WORD_SECONDS, DEMO_CONFIDENCE));
            cursor += DEMO_WORD_SECONDS;
        }
        cursor += DEMO_SENTENCE_PAUSE;
    }

    let full_text = demo_sentences(language).join(" ");
    Timeline::new(words, full_text)
}

/// Demo transcript payload, tagged `source: demo`
pub fn demo_data(video_id: &str, language: &str) -> TranscriptData {
    let resolved = Language::from_code(language);
    let timeline = demo_timeline(resolved);
    info!("🎭 Generated demo transcript for {} ({} words)", video_id, timeline.len());

    TranscriptData::from_timeline(video_id, resolved.code(), &timeline, TranscriptSource::Demo)
}

/// Demo transcript envelope, tagged `source: demo` and `isDemoData: true`
pub fn generate_demo(video_id: &str, language: &str) -> TranscriptResult {
    TranscriptResult::success(demo_data(video_id, language))
}

/// Demo transcript with the chapters the regular engine derives from it
#[derive(Debug, Clone)]
pub struct DemoRun {
    pub data: TranscriptData,
    pub candidates: Vec<BreakCandidate>,
    pub chapters: Vec<Chapter>,
}

/// Runs the regular detector and assembler over the demo timeline
#[derive(Debug, Clone, Default)]
pub struct DemoGenerator {
    detection: DetectionConfig,
    assembly: AssemblyConfig,
}

impl DemoGenerator {
    pub fn new(detection: DetectionConfig, assembly: AssemblyConfig) -> Self {
        Self { detection, assembly }
    }

    pub fn generate(&self, video_id: &str, language: &str) -> DemoRun {
        let data = demo_data(video_id, language);
        let resolved = Language::from_code(&data.language);
        let timeline = data.timeline();

        let candidates = BreakDetector::new(self.detection.clone(), resolved).detect_breaks(&timeline);
        let chapters = ChapterAssembler::new(self.assembly.clone(), resolved).assemble(&timeline, &candidates);

        DemoRun {
            data,
            candidates,
            chapters,
        }
    }
}
